//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 网络传输
//!
//! 按行分隔的 JSON over TCP：
//! - wire: 消息类型与分帧
//! - server: 内核入站服务
//! - client: 访问内存 / CPU / IO 的出站客户端

pub mod client;
pub mod server;
pub mod wire;

pub use client::{RemoteCpu, RemoteIo, RemoteMemory};
pub use server::serve;
pub use wire::{KernelReply, KernelRequest, PeerReply, PeerRequest};

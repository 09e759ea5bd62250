//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 资源池：已注册的 CPU 与 IO 设备
//!
//! 两个池各自加锁，锁内不做任何网络调用。

pub mod cpu;
pub mod io;

pub use cpu::{CpuConnection, CpuPool};
pub use io::{Handoff, IoConnection, IoPool, IoRequest};

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 操作系统模拟器内核
//!
//! 内核是一组协作网络服务（内核、CPU、内存、IO）中的调度者：
//! 维护进程状态机和七条状态队列，由长期、中期、短期三个调度循环
//! 在 NEW / READY / EXEC / BLOCKED / SUSP_BLOCKED / SUSP_READY / EXIT
//! 之间移动进程。

pub mod cmdline;
pub mod config;
pub mod console;
pub mod error;
pub mod kernel;
pub mod net;
pub mod peer;
pub mod pool;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscall;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult, PeerError};
pub use kernel::{Kernel, Peers};
pub use process::{Pid, ProcState};

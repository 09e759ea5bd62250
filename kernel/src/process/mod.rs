//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程管理模块
//!
//! - `task`: 进程控制块与状态机
//! - `pid`: PID 分配
//! - `queue`: 按状态划分的队列与进程表
//! - `wait`: 阻塞等待记录

pub mod pid;
pub mod queue;
pub mod task;
pub mod wait;

pub use pid::Pid;
pub use queue::{ProcessQueues, SelectPolicy};
pub use task::{Metrics, ProcState, Process};
pub use wait::{BlockedWait, WaitList};

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 同步原语
//!
//! 调度循环之间只通过合并式信号互相唤醒，阻塞时不持有任何锁。

pub mod signal;

pub use signal::{Signal, SignalBus};

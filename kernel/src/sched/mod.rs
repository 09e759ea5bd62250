//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! 三级调度，每级一个线程：
//! - 长期调度 (lts): NEW -> READY，受内存容量限制
//! - 短期调度 (sts): READY -> EXEC，FIFO / SJF / SRT（可抢占）
//! - 中期调度 (mts): BLOCKED <-> SUSP_BLOCKED，SUSP_READY -> READY
//!
//! 循环之间只通过信号总线协作，唤醒后重新检查条件。

pub mod burst;
pub mod lts;
pub mod mts;
pub mod sts;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::KernelResult;
use crate::kernel::Kernel;

/// 启动三个调度线程
///
/// 长期调度在 `start_admission` 之前不会准入任何进程
pub fn start(kernel: &Arc<Kernel>) -> KernelResult<Vec<JoinHandle<()>>> {
    let loops: [(&str, fn(Arc<Kernel>)); 3] = [("lts", lts::run), ("sts", sts::run), ("mts", mts::run)];
    let mut handles = Vec::with_capacity(loops.len());
    for (name, body) in loops {
        let k = kernel.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(k))?;
        handles.push(handle);
    }
    log::info!("sched: {} scheduler loops running", handles.len());
    Ok(handles)
}

/// 放行长期调度
pub fn start_admission(kernel: &Kernel) {
    log::info!("sched: admission started");
    kernel.signals.lts_start.raise();
}

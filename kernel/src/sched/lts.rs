//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 长期调度（准入）
//!
//! NEW -> READY，受内存容量限制：
//! 1. SUSP_READY 非空时让位给中期调度，等待重试准入信号
//! 2. 按入口算法挑选 NEW 候选
//! 3. 没有候选时等待 NEW 队列信号
//! 4. 请求内存服务创建进程：成功进入 READY；内存不足留在 NEW，等待重试

use std::sync::Arc;

use crate::error::PeerError;
use crate::kernel::Kernel;
use crate::process::{Pid, ProcState};

pub fn run(kernel: Arc<Kernel>) {
    log::info!("lts: waiting for start trigger");
    if !kernel.signals.lts_start.wait() {
        return;
    }
    log::info!("lts: started");

    let policy = kernel.config.ready_ingress_algorithm.select();
    loop {
        if !kernel.queues.is_empty(ProcState::SuspReady) {
            log::debug!("lts: SUSP_READY has work, yielding to mts");
            kernel.signals.mts_work.raise();
            if !kernel.signals.retry_admission.wait() {
                break;
            }
            continue;
        }

        let pid = match kernel.queues.search(ProcState::New, policy) {
            Some(pid) => pid,
            None => {
                log::info!("lts: no pending process, sleeping");
                if !kernel.signals.lts_work.wait() {
                    break;
                }
                continue;
            }
        };

        if !try_admit(&kernel, pid) && !kernel.signals.retry_admission.wait() {
            break;
        }
    }
    log::info!("lts: stopped");
}

/// 请求内存服务为进程分配内存
///
/// 成功时 NEW -> READY 并唤醒短期调度
pub fn try_admit(kernel: &Kernel, pid: Pid) -> bool {
    let (size, code) = match kernel.queues.with(pid, |p| (p.size, kernel.config.code_path(&p.path))) {
        Some(v) => v,
        None => return false,
    };

    match kernel.peers.memory.create(pid, size, &code) {
        Ok(()) => {
            if kernel.queues.remove(ProcState::New, pid).is_none() {
                return false;
            }
            kernel.queues.with(pid, |p| p.in_memory = true);
            kernel.queues.enqueue(ProcState::Ready, pid);
            log::info!("lts: pid {} admitted", pid);
            kernel.ready_added();
            true
        }
        Err(PeerError::InsufficientMemory) => {
            log::debug!("lts: pid {} waits for memory ({} bytes)", pid, size);
            false
        }
        Err(e) => {
            log::error!("lts: pid {} admission failed: {}", pid, e);
            false
        }
    }
}

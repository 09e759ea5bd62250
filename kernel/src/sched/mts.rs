//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 中期调度（换出 / 换入）
//!
//! BLOCKED <-> SUSP_BLOCKED，SUSP_READY -> READY：
//! 1. 为每个尚未计时的 IO 阻塞进程启动换出计时器（每个计时器一个线程）
//! 2. 按入口算法换入 SUSP_READY；内存不足时停止本轮
//! 3. 本轮没有内存压力时唤醒长期调度重试准入
//! 4. 等待中期调度信号
//!
//! 计时器按等待记录的 ticket 绑定：到期时记录已被替换或移除，
//! 或者进程已离开 BLOCKED，计时器什么都不做。
//!
//! `timer_running` 在计时器启动时置位，换出请求结束后才清除；
//! 换出请求进行中的进程不会被换入。

use std::sync::Arc;
use std::thread;

use crate::error::PeerError;
use crate::kernel::Kernel;
use crate::process::{Pid, ProcState};
use crate::sync::SignalBus;

pub fn run(kernel: Arc<Kernel>) {
    log::info!("mts: started");
    loop {
        arm_timers(&kernel);
        if drain_suspended_ready(&kernel) {
            SignalBus::raise_either(&kernel.signals.retry_admission, &kernel.signals.lts_work);
        }
        if !kernel.signals.mts_work.wait() {
            break;
        }
    }
    log::info!("mts: stopped");
}

// ============================================================
// 换出
// ============================================================

/// 为尚未计时的 IO 阻塞进程启动换出计时器，返回启动的数量
pub fn arm_timers(kernel: &Arc<Kernel>) -> usize {
    let mut armed = 0;
    for wait in kernel.waits.snapshot() {
        if wait.is_memory_dump() {
            continue;
        }
        let pid = wait.pid;
        let claimed = kernel
            .queues
            .with(pid, |p| {
                if p.state() == ProcState::Blocked && !p.timer_running {
                    p.timer_running = true;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if !claimed {
            continue;
        }

        let delay = kernel.config.suspension_delay();
        let ticket = wait.ticket;
        let k = kernel.clone();
        let spawned = thread::Builder::new()
            .name(format!("suspend-{}", pid))
            .spawn(move || {
                thread::sleep(delay);
                expire(&k, pid, ticket);
            });
        match spawned {
            Ok(_) => {
                log::debug!("mts: suspension timer for pid {} ({}ms)", pid, delay.as_millis());
                armed += 1;
            }
            Err(e) => {
                log::error!("mts: cannot start suspension timer for pid {}: {}", pid, e);
                kernel.queues.with(pid, |p| p.timer_running = false);
            }
        }
    }
    armed
}

/// 换出计时器到期
pub fn expire(kernel: &Kernel, pid: Pid, ticket: u64) {
    let suspended = {
        let _guard = kernel.suspend_lock.lock();
        let moved = kernel.waits.is_current(pid, ticket)
            && kernel.queues.state_of(pid) == Some(ProcState::Blocked)
            && kernel
                .queues
                .transfer_from(ProcState::Blocked, pid, ProcState::SuspBlocked);
        if !moved {
            kernel.queues.with(pid, |p| p.timer_running = false);
        }
        moved
    };

    if !suspended {
        log::debug!("mts: timer for pid {} expired with nothing to do", pid);
        // 进程在计时期间再次阻塞，需要新的计时器
        if kernel.queues.state_of(pid) == Some(ProcState::Blocked) {
            kernel.signals.mts_work.raise();
        }
        return;
    }

    match kernel.peers.memory.suspend(pid) {
        Ok(()) => {
            kernel.queues.with(pid, |p| {
                p.in_memory = false;
                p.timer_running = false;
            });
            log::info!("mts: pid {} swapped out", pid);
            kernel.signals.mts_work.raise();
        }
        Err(e) => {
            log::warn!("mts: swap-out of pid {} failed: {}", pid, e);
            let _guard = kernel.suspend_lock.lock();
            kernel.queues.with(pid, |p| p.timer_running = false);
            match kernel.queues.state_of(pid) {
                Some(ProcState::SuspBlocked) => {
                    kernel
                        .queues
                        .transfer_from(ProcState::SuspBlocked, pid, ProcState::Blocked);
                    kernel.signals.mts_work.raise();
                }
                Some(ProcState::SuspReady) => {
                    if kernel
                        .queues
                        .transfer_from(ProcState::SuspReady, pid, ProcState::Ready)
                    {
                        kernel.ready_added();
                    }
                }
                _ => {}
            }
        }
    }
}

// ============================================================
// 换入
// ============================================================

/// 换入 SUSP_READY
///
/// 全部换入时返回 true；内存不足、换入失败或换出仍在进行时返回 false
pub fn drain_suspended_ready(kernel: &Kernel) -> bool {
    let policy = kernel.config.ready_ingress_algorithm.select();
    while let Some(pid) = kernel.queues.search(ProcState::SuspReady, policy) {
        if kernel.queues.with(pid, |p| p.timer_running).unwrap_or(false) {
            log::debug!("mts: pid {} swap-out still in flight", pid);
            return false;
        }

        match kernel.peers.memory.unsuspend(pid) {
            Ok(()) => {
                kernel.waits.remove(pid);
                kernel.queues.with(pid, |p| p.in_memory = true);
                if kernel
                    .queues
                    .transfer_from(ProcState::SuspReady, pid, ProcState::Ready)
                {
                    log::info!("mts: pid {} swapped in", pid);
                    kernel.ready_added();
                }
            }
            Err(PeerError::InsufficientMemory) => {
                log::debug!("mts: not enough memory to swap in pid {}", pid);
                return false;
            }
            Err(e) => {
                log::warn!("mts: swap-in of pid {} failed: {}", pid, e);
                return false;
            }
        }
    }
    true
}

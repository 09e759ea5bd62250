//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 短期调度（派发 / 抢占）
//!
//! READY -> EXEC：
//! 1. 有空闲 CPU：按策略取出 READY 最优进程派发；没有进程时等待 READY 信号
//! 2. 没有空闲 CPU 且策略可抢占 (SRT)：比较 READY 最短估算与所有忙碌 CPU 上
//!    剩余时间最长的进程，剩余时间严格大于候选估算时中断该 CPU
//! 3. 否则等待 CPU 空闲信号
//!
//! 被中断的 CPU 经由正常的结果上报路径变为空闲，再走步骤 1 派发。
//! 每个未回报的中断预留 READY 中排在最前的一个候选，一个候选最多换来一次中断。
//!
//! 派发失败的 CPU 标记为故障，下一次 CPU 空闲信号到来前不再向它派发。

use std::sync::Arc;
use std::time::Instant;

use crate::kernel::Kernel;
use crate::peer::CpuEndpoint;
use crate::process::{Pid, ProcState};
use crate::sched::burst::BurstEstimator;

pub fn run(kernel: Arc<Kernel>) {
    while kernel.cpus.is_empty() {
        log::info!("sts: no cpu connected yet");
        if !kernel.signals.cpu_available.wait() {
            return;
        }
    }
    log::info!("sts: started");

    let algorithm = kernel.config.scheduler_algorithm;
    let policy = algorithm.select();
    loop {
        if let Some(cpu) = kernel.cpus.idle_cpu() {
            match kernel.queues.dequeue(ProcState::Ready, policy) {
                Some(pid) => dispatch(&kernel, pid, &cpu),
                None => {
                    log::debug!("sts: READY is empty, sleeping");
                    if !kernel.signals.sts_work.wait() {
                        break;
                    }
                }
            }
            continue;
        }

        if algorithm.is_preemptive() && try_preempt(&kernel) {
            continue;
        }

        log::debug!("sts: no idle cpu, waiting");
        if !kernel.signals.cpu_available.wait() {
            break;
        }
        if kernel.cpus.clear_faults() {
            log::debug!("sts: retrying faulted cpus");
        }
    }
    log::info!("sts: stopped");
}

/// 派发进程到 CPU
///
/// CPU 拒绝或不可达时撤销：进程回到 READY，CPU 空闲并标记故障
pub fn dispatch(kernel: &Kernel, pid: Pid, cpu: &CpuEndpoint) {
    if !kernel.cpus.assign(&cpu.id, pid) {
        log::warn!("sts: cpu {} no longer idle, pid {} back to READY", cpu.id, pid);
        kernel.queues.enqueue(ProcState::Ready, pid);
        return;
    }
    kernel.queues.enqueue(ProcState::Exec, pid);
    let pc = kernel
        .queues
        .with(pid, |p| {
            p.dispatched_at = Some(Instant::now());
            p.pc
        })
        .unwrap_or(0);
    log::info!("sts: pid {} dispatched to cpu {}", pid, cpu.id);

    if let Err(e) = kernel.peers.cpu.dispatch(cpu, pid, pc) {
        log::error!("sts: dispatch of pid {} to cpu {} failed: {}", pid, cpu.id, e);
        if kernel.queues.remove(ProcState::Exec, pid).is_some() {
            kernel.queues.enqueue(ProcState::Ready, pid);
        }
        kernel.cpus.release(pid);
        kernel.cpus.mark_faulted(&cpu.id);
    }
}

/// 选出被抢占的 CPU
///
/// 只比较正在运行进程的 CPU；全部空闲时返回 None
pub fn pick_victim(kernel: &Kernel, now: Instant) -> Option<(CpuEndpoint, Pid, u64)> {
    kernel
        .cpus
        .busy()
        .into_iter()
        .filter_map(|(cpu, pid)| {
            let remaining = kernel.queues.with(pid, |p| BurstEstimator::remaining(p, now))?;
            Some((cpu, pid, remaining))
        })
        .fold(None, |best: Option<(CpuEndpoint, Pid, u64)>, item| match best {
            Some(b) if b.2 >= item.2 => Some(b),
            _ => Some(item),
        })
}

/// 抢占判定：剩余时间严格大于候选估算
#[inline]
pub fn should_preempt(victim_remaining: u64, candidate_estimate: u64) -> bool {
    victim_remaining > candidate_estimate
}

/// SRT 抢占；发出中断时返回 true
///
/// 前 n 个 READY 候选已由 n 个未回报的中断预留
fn try_preempt(kernel: &Kernel) -> bool {
    let policy = kernel.config.scheduler_algorithm.select();
    let reserved = kernel.cpus.interrupts_in_flight();
    let candidate = match kernel.queues.search_nth(ProcState::Ready, policy, reserved) {
        Some(pid) => pid,
        None => return false,
    };
    let estimate = match kernel.queues.with(candidate, |p| p.estimated) {
        Some(e) => e,
        None => return false,
    };
    let (cpu, victim, remaining) = match pick_victim(kernel, Instant::now()) {
        Some(v) => v,
        None => return false,
    };
    log::debug!(
        "sts: longest remaining pid {} ({}ms) vs shortest ready pid {} ({}ms)",
        victim,
        remaining,
        candidate,
        estimate
    );
    if !should_preempt(remaining, estimate) {
        return false;
    }

    kernel.cpus.set_interrupting(&cpu.id, true);
    match kernel.peers.cpu.interrupt(&cpu, victim) {
        Ok(()) => {
            log::info!(
                "sts: interrupting pid {} on cpu {} for pid {}",
                victim,
                cpu.id,
                candidate
            );
            true
        }
        Err(e) => {
            log::error!("sts: interrupt of pid {} on cpu {} failed: {}", victim, cpu.id, e);
            kernel.cpus.set_interrupting(&cpu.id, false);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preemption_needs_strictly_longer_remaining() {
        assert!(should_preempt(500, 50));
        assert!(!should_preempt(50, 50));
        assert!(!should_preempt(0, 50));
    }
}

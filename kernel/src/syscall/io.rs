//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! IO 设备相关事件
//!
//! 设备实例按 (名称, 地址) 注册。注册请求是长轮询：
//! 有排队中的 IO 请求时立即返回，否则阻塞到内核交付请求或关机。
//!
//! IO 完成与换出计时器到期都在 `suspend_lock` 下检查进程状态，
//! 两者谁先发生都能得到一致的结果。

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::pool::IoRequest;
use crate::process::{Pid, ProcState};

impl Kernel {
    /// EXEC -> BLOCKED，登记等待；有同名空闲设备时立即交付
    pub(crate) fn block_on_io(&self, pid: Pid, device: &str, duration_ms: u64) -> KernelResult<()> {
        if self.queues.remove(ProcState::Exec, pid).is_none() {
            return Err(KernelError::NotFound(format!("pid {} not executing", pid)));
        }
        self.leave_exec(pid);
        self.queues.enqueue(ProcState::Blocked, pid);
        self.waits.add_io(pid, device, duration_ms);
        log::info!("intake: pid {} blocked on {} for {}ms", pid, device, duration_ms);

        self.hand_to_idle_device(device, IoRequest { pid, duration_ms });
        self.signals.mts_work.raise();
        Ok(())
    }

    /// 有同名空闲设备时交付请求，否则请求留在等待记录里
    fn hand_to_idle_device(&self, device: &str, request: IoRequest) {
        let pid = request.pid;
        if let Some(handoff) = self.ios.claim_idle(device) {
            self.waits.mark_handed_off(pid);
            if handoff.push(request) {
                log::debug!("intake: pid {} handed to device {}", pid, device);
            } else {
                log::warn!("intake: device {} went away, pid {} stays queued", device, pid);
                self.waits.requeue(pid);
            }
        } else {
            log::debug!("intake: no idle {} device, pid {} queued", device, pid);
        }
    }

    /// 设备注册（长轮询）
    ///
    /// 返回交给设备的请求；内核关机时返回 None
    pub fn register_io(&self, name: &str, addr: &str) -> Option<IoRequest> {
        let (handoff, created) = self.ios.register(name, addr);
        if created {
            log::info!("intake: io {} registered at {}", name, addr);
        } else {
            log::debug!("intake: io {}@{} polling", name, addr);
        }

        let queued = handoff.try_take().or_else(|| {
            self.waits.claim_pending(name).map(|w| IoRequest {
                pid: w.pid,
                duration_ms: w.duration_ms,
            })
        });
        if let Some(request) = queued {
            self.ios.set_available(name, addr, false);
            log::info!("intake: pid {} handed to {}@{}", request.pid, name, addr);
            return Some(request);
        }

        if self.is_shutting_down() {
            return None;
        }
        let request = handoff.take();
        if request.is_none() {
            log::debug!("intake: io {}@{} long-poll closed", name, addr);
        }
        request
    }

    /// 设备完成 IO
    ///
    /// BLOCKED -> READY；已换出的进程 SUSP_BLOCKED -> SUSP_READY，由中期调度换入
    pub fn io_finished(&self, name: &str, addr: &str, pid: Pid) -> KernelResult<()> {
        if !self.ios.set_available(name, addr, true) {
            return Err(KernelError::NotFound(format!("io {}@{}", name, addr)));
        }

        let guard = self.suspend_lock.lock();
        if self.waits.remove_for(name, pid).is_none() {
            drop(guard);
            log::info!("intake: io {} finished for pid {} with no wait on record", name, pid);
            return Err(KernelError::NotFound(format!("pid {} waiting on {}", pid, name)));
        }
        let state = self.queues.state_of(pid);
        match state {
            Some(ProcState::SuspBlocked) => {
                self.queues
                    .transfer_from(ProcState::SuspBlocked, pid, ProcState::SuspReady);
                drop(guard);
                log::info!("intake: pid {} finished IO on {} while swapped out", pid, name);
                self.signals.mts_work.raise();
            }
            Some(ProcState::Blocked) => {
                self.queues
                    .transfer_from(ProcState::Blocked, pid, ProcState::Ready);
                drop(guard);
                log::info!("intake: pid {} finished IO on {}", pid, name);
                self.ready_added();
            }
            other => {
                drop(guard);
                log::warn!("intake: pid {} finished IO in unexpected state {:?}", pid, other);
            }
        }
        Ok(())
    }

    /// 设备断开
    ///
    /// 终止正在该设备上等待的进程；已交付但设备尚未取走的请求重新排队。
    /// 同名的最后一个实例断开时，终止所有仍在等待该设备名的进程
    pub fn io_disconnected(&self, name: &str, addr: &str, pid: Option<Pid>) -> KernelResult<()> {
        if !self.ios.contains(name, addr) {
            return Err(KernelError::NotFound(format!("io {}@{}", name, addr)));
        }
        if let Some(pid) = pid {
            if self.waits.remove_for(name, pid).is_some() {
                log::warn!("intake: io {}@{} disconnected while serving pid {}", name, addr, pid);
                self.kill(pid);
            }
        }
        let untaken = self.ios.remove(name, addr).unwrap_or_default();
        log::info!("intake: io {}@{} disconnected", name, addr);

        let still_waiting = |r: &IoRequest| Some(r.pid) != pid && self.waits.get(r.pid).is_some();
        for request in untaken.into_iter().filter(still_waiting) {
            log::info!("intake: pid {} was never taken by {}@{}, requeued", request.pid, name, addr);
            self.waits.requeue(request.pid);
            if self.ios.has_name(name) {
                self.hand_to_idle_device(name, request);
            }
        }

        if !self.ios.has_name(name) {
            for wait in self.waits.drain_device(name) {
                log::warn!("intake: last {} device gone, pid {} terminated", name, wait.pid);
                self.kill(wait.pid);
            }
        }
        Ok(())
    }
}

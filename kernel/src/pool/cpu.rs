//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! CPU 资源池
//!
//! 每个已注册 CPU 记录当前分配的进程（None 表示空闲）。
//! 不变量：同一进程最多被一个 CPU 引用，且该进程处于 EXEC。
//!
//! 派发失败的 CPU 标记为故障，`idle_cpu` 跳过它，
//! 直到下一次 CPU 空闲事件由短期调度调用 `clear_faults`。

use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::peer::CpuEndpoint;
use crate::process::Pid;

#[derive(Debug, Clone)]
pub struct CpuConnection {
    pub endpoint: CpuEndpoint,
    pub running: Option<Pid>,
    /// 已发出中断、等待 CPU 回报
    pub interrupting: bool,
    /// 上一次派发被拒绝或不可达
    pub faulted: bool,
}

pub struct CpuPool {
    cpus: Mutex<Vec<CpuConnection>>,
}

impl CpuPool {
    pub fn new() -> Self {
        Self {
            cpus: Mutex::new(Vec::new()),
        }
    }

    /// 注册 CPU；id 重复时返回冲突
    pub fn register(&self, id: &str, addr: &str) -> KernelResult<()> {
        let mut cpus = self.cpus.lock();
        if cpus.iter().any(|c| c.endpoint.id == id) {
            return Err(KernelError::Conflict(id.to_string()));
        }
        cpus.push(CpuConnection {
            endpoint: CpuEndpoint {
                id: id.to_string(),
                addr: addr.to_string(),
            },
            running: None,
            interrupting: false,
            faulted: false,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.lock().is_empty()
    }

    /// 第一个空闲且未标记故障的 CPU
    pub fn idle_cpu(&self) -> Option<CpuEndpoint> {
        self.cpus
            .lock()
            .iter()
            .find(|c| c.running.is_none() && !c.faulted)
            .map(|c| c.endpoint.clone())
    }

    /// 把进程分配给空闲 CPU
    pub fn assign(&self, id: &str, pid: Pid) -> bool {
        let mut cpus = self.cpus.lock();
        match cpus.iter_mut().find(|c| c.endpoint.id == id) {
            Some(cpu) if cpu.running.is_none() => {
                cpu.running = Some(pid);
                cpu.interrupting = false;
                true
            }
            _ => false,
        }
    }

    pub fn running_on(&self, id: &str) -> Option<Pid> {
        self.cpus
            .lock()
            .iter()
            .find(|c| c.endpoint.id == id)
            .and_then(|c| c.running)
    }

    pub fn cpu_of(&self, pid: Pid) -> Option<CpuEndpoint> {
        self.cpus
            .lock()
            .iter()
            .find(|c| c.running == Some(pid))
            .map(|c| c.endpoint.clone())
    }

    /// 释放运行该进程的 CPU
    pub fn release(&self, pid: Pid) -> Option<CpuEndpoint> {
        let mut cpus = self.cpus.lock();
        let cpu = cpus.iter_mut().find(|c| c.running == Some(pid))?;
        cpu.running = None;
        cpu.interrupting = false;
        Some(cpu.endpoint.clone())
    }

    /// 忙碌且没有待处理中断的 CPU
    pub fn busy(&self) -> Vec<(CpuEndpoint, Pid)> {
        self.cpus
            .lock()
            .iter()
            .filter(|c| !c.interrupting)
            .filter_map(|c| c.running.map(|pid| (c.endpoint.clone(), pid)))
            .collect()
    }

    /// 标记中断已发出
    pub fn set_interrupting(&self, id: &str, value: bool) {
        if let Some(cpu) = self.cpus.lock().iter_mut().find(|c| c.endpoint.id == id) {
            cpu.interrupting = value;
        }
    }

    /// 已发出、尚未回报的中断数
    pub fn interrupts_in_flight(&self) -> usize {
        self.cpus.lock().iter().filter(|c| c.interrupting).count()
    }

    pub fn mark_faulted(&self, id: &str) {
        if let Some(cpu) = self.cpus.lock().iter_mut().find(|c| c.endpoint.id == id) {
            cpu.faulted = true;
        }
    }

    /// 清除故障标记；有 CPU 被清除时返回 true
    pub fn clear_faults(&self) -> bool {
        let mut cleared = false;
        for cpu in self.cpus.lock().iter_mut().filter(|c| c.faulted) {
            cpu.faulted = false;
            cleared = true;
        }
        cleared
    }

    pub fn endpoints(&self) -> Vec<CpuEndpoint> {
        self.cpus.lock().iter().map(|c| c.endpoint.clone()).collect()
    }
}

impl Default for CpuPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_id_conflicts() {
        let pool = CpuPool::new();
        pool.register("cpu-1", "127.0.0.1:9001").unwrap();
        let err = pool.register("cpu-1", "127.0.0.1:9009").unwrap_err();
        assert!(matches!(err, KernelError::Conflict(id) if id == "cpu-1"));
        assert_eq!(pool.endpoints().len(), 1);
    }

    #[test]
    fn idle_cpu_is_first_unassigned() {
        let pool = CpuPool::new();
        assert!(pool.idle_cpu().is_none());
        pool.register("a", "x").unwrap();
        pool.register("b", "y").unwrap();
        assert!(pool.assign("a", Pid(1)));
        assert!(!pool.assign("a", Pid(2)));
        assert_eq!(pool.idle_cpu().unwrap().id, "b");
        assert!(pool.assign("b", Pid(2)));
        assert!(pool.idle_cpu().is_none());

        assert_eq!(pool.release(Pid(1)).unwrap().id, "a");
        assert_eq!(pool.idle_cpu().unwrap().id, "a");
        assert!(pool.release(Pid(1)).is_none());
    }

    #[test]
    fn busy_skips_idle_and_interrupting() {
        let pool = CpuPool::new();
        pool.register("a", "x").unwrap();
        pool.register("b", "y").unwrap();
        pool.register("c", "z").unwrap();
        pool.assign("a", Pid(1));
        pool.assign("c", Pid(3));
        pool.set_interrupting("c", true);
        let busy = pool.busy();
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].1, Pid(1));
        assert_eq!(pool.cpu_of(Pid(3)).unwrap().id, "c");
        assert_eq!(pool.running_on("b"), None);
        assert_eq!(pool.interrupts_in_flight(), 1);
        pool.release(Pid(3));
        assert_eq!(pool.interrupts_in_flight(), 0);
    }

    #[test]
    fn faulted_cpu_is_skipped_until_cleared() {
        let pool = CpuPool::new();
        pool.register("a", "x").unwrap();
        pool.register("b", "y").unwrap();
        pool.mark_faulted("a");
        assert_eq!(pool.idle_cpu().unwrap().id, "b");
        pool.mark_faulted("b");
        assert!(pool.idle_cpu().is_none());
        assert!(pool.clear_faults());
        assert!(!pool.clear_faults());
        assert_eq!(pool.idle_cpu().unwrap().id, "a");
    }
}

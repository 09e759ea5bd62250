//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 集成测试公共设施：进程内的内存 / CPU / IO 替身

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use osim_kernel::config::{DispatchPolicy, IngressPolicy, KernelConfig};
use osim_kernel::peer::{CpuClient, CpuEndpoint, IoClient, MemoryClient, PeerResult};
use osim_kernel::{sched, Kernel, PeerError, Peers, Pid};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// 轮询直到条件成立或超时
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

// ============================================================
// 内存替身
// ============================================================

#[derive(Default)]
struct MemoryState {
    resident: HashMap<Pid, usize>,
    swapped: HashMap<Pid, usize>,
    log: Vec<String>,
}

/// 按容量分配的内存服务
pub struct MockMemory {
    capacity: usize,
    state: Mutex<MemoryState>,
    fail_dump: AtomicBool,
    shutdowns: AtomicUsize,
}

impl MockMemory {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            state: Mutex::new(MemoryState::default()),
            fail_dump: AtomicBool::new(false),
            shutdowns: AtomicUsize::new(0),
        })
    }

    fn used(state: &MemoryState) -> usize {
        state.resident.values().sum()
    }

    pub fn is_resident(&self, pid: Pid) -> bool {
        self.state.lock().resident.contains_key(&pid)
    }

    pub fn is_swapped(&self, pid: Pid) -> bool {
        self.state.lock().swapped.contains_key(&pid)
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn fail_dumps(&self) {
        self.fail_dump.store(true, Ordering::SeqCst);
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl MemoryClient for MockMemory {
    fn create(&self, pid: Pid, size: usize, _code: &Path) -> PeerResult {
        let mut state = self.state.lock();
        if Self::used(&state) + size > self.capacity {
            return Err(PeerError::InsufficientMemory);
        }
        state.resident.insert(pid, size);
        state.log.push(format!("create {}", pid));
        Ok(())
    }

    fn delete(&self, pid: Pid) -> PeerResult {
        let mut state = self.state.lock();
        state.resident.remove(&pid);
        state.swapped.remove(&pid);
        state.log.push(format!("delete {}", pid));
        Ok(())
    }

    fn suspend(&self, pid: Pid) -> PeerResult {
        let mut state = self.state.lock();
        let size = state
            .resident
            .remove(&pid)
            .ok_or_else(|| PeerError::Rejected(format!("pid {} not resident", pid)))?;
        state.swapped.insert(pid, size);
        state.log.push(format!("suspend {}", pid));
        Ok(())
    }

    fn unsuspend(&self, pid: Pid) -> PeerResult {
        let mut state = self.state.lock();
        let size = *state
            .swapped
            .get(&pid)
            .ok_or_else(|| PeerError::Rejected(format!("pid {} not swapped", pid)))?;
        if Self::used(&state) + size > self.capacity {
            return Err(PeerError::InsufficientMemory);
        }
        state.swapped.remove(&pid);
        state.resident.insert(pid, size);
        state.log.push(format!("unsuspend {}", pid));
        Ok(())
    }

    fn dump(&self, pid: Pid) -> PeerResult {
        self.state.lock().log.push(format!("dump {}", pid));
        if self.fail_dump.load(Ordering::SeqCst) {
            return Err(PeerError::Rejected("dump failed".into()));
        }
        Ok(())
    }

    fn ping(&self) -> PeerResult {
        Ok(())
    }

    fn shutdown(&self) -> PeerResult {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================
// CPU / IO 替身
// ============================================================

/// 只记录调用的 CPU；`reject` 过的 CPU 派发时返回不可达
#[derive(Default)]
pub struct MockCpu {
    dispatches: Mutex<Vec<(String, Pid)>>,
    interrupts: Mutex<Vec<(String, Pid)>>,
    rejecting: Mutex<HashSet<String>>,
    rejected: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl MockCpu {
    pub fn dispatches(&self) -> Vec<(String, Pid)> {
        self.dispatches.lock().clone()
    }

    pub fn dispatched_pids(&self) -> Vec<Pid> {
        self.dispatches.lock().iter().map(|(_, pid)| *pid).collect()
    }

    pub fn interrupts(&self) -> Vec<(String, Pid)> {
        self.interrupts.lock().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn reject(&self, id: &str) {
        self.rejecting.lock().insert(id.to_string());
    }

    /// 被拒绝的派发次数
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

impl CpuClient for MockCpu {
    fn dispatch(&self, cpu: &CpuEndpoint, pid: Pid, _pc: u64) -> PeerResult {
        if self.rejecting.lock().contains(&cpu.id) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(PeerError::Unreachable(format!("{}: connection refused", cpu.addr)));
        }
        self.dispatches.lock().push((cpu.id.clone(), pid));
        Ok(())
    }

    fn interrupt(&self, cpu: &CpuEndpoint, pid: Pid) -> PeerResult {
        self.interrupts.lock().push((cpu.id.clone(), pid));
        Ok(())
    }

    fn shutdown(&self, _cpu: &CpuEndpoint) -> PeerResult {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockIo {
    shutdowns: AtomicUsize,
}

impl MockIo {
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl IoClient for MockIo {
    fn shutdown(&self, _name: &str, _addr: &str) -> PeerResult {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================
// 测试内核
// ============================================================

pub struct Harness {
    pub kernel: Arc<Kernel>,
    pub memory: Arc<MockMemory>,
    pub cpu: Arc<MockCpu>,
    pub io: Arc<MockIo>,
    loops: Vec<JoinHandle<()>>,
}

pub fn config(dispatch: DispatchPolicy, ingress: IngressPolicy) -> KernelConfig {
    KernelConfig {
        scheduler_algorithm: dispatch,
        ready_ingress_algorithm: ingress,
        suspension_time: 200,
        initial_estimate: 50,
        ..KernelConfig::default()
    }
}

impl Harness {
    /// 建立内核并启动调度循环（准入尚未放行）
    pub fn start(config: KernelConfig, memory_capacity: usize) -> Self {
        let memory = MockMemory::new(memory_capacity);
        let cpu = Arc::new(MockCpu::default());
        let io = Arc::new(MockIo::default());
        let peers = Peers {
            memory: memory.clone(),
            cpu: cpu.clone(),
            io: io.clone(),
        };
        let kernel = Kernel::new(config, peers);
        let loops = sched::start(&kernel).expect("scheduler threads");
        Self {
            kernel,
            memory,
            cpu,
            io,
            loops,
        }
    }

    pub fn admit(&self) {
        sched::start_admission(&self.kernel);
    }

    /// 等待第 n 次派发（从 1 开始计数），返回其 pid
    pub fn nth_dispatch(&self, n: usize) -> Pid {
        wait_until(&format!("dispatch #{}", n), || self.cpu.dispatches().len() >= n);
        self.cpu.dispatched_pids()[n - 1]
    }

    /// 等待内核停机并回收调度线程
    pub fn join(&mut self) {
        self.kernel.wait_halted();
        for handle in std::mem::take(&mut self.loops) {
            handle.join().expect("scheduler loop panicked");
        }
    }
}

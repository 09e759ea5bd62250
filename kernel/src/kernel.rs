//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 内核调度上下文
//!
//! 所有共享状态（队列、资源池、等待记录、信号）都是 `Kernel` 的字段，
//! 由三个调度循环和 intake 处理函数通过 `Arc<Kernel>` 共享。
//! 每个字段各有自己的锁，网络调用期间不持有任何锁。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::KernelConfig;
use crate::peer::{CpuClient, IoClient, MemoryClient};
use crate::pool::{CpuPool, IoPool};
use crate::process::pid::PidAllocator;
use crate::process::{Pid, ProcState, Process, ProcessQueues, WaitList};
use crate::sched::burst::BurstEstimator;
use crate::sync::SignalBus;

/// 外部协作方
pub struct Peers {
    pub memory: Arc<dyn MemoryClient>,
    pub cpu: Arc<dyn CpuClient>,
    pub io: Arc<dyn IoClient>,
}

pub struct Kernel {
    pub config: KernelConfig,
    pub queues: ProcessQueues,
    pub waits: WaitList,
    pub cpus: CpuPool,
    pub ios: IoPool,
    pub signals: SignalBus,
    pub estimator: BurstEstimator,
    pub peers: Peers,

    /// 串行化换出计时器到期与 IO 完成 / 换入之间的状态检查
    pub(crate) suspend_lock: Mutex<()>,

    pids: PidAllocator,
    created: AtomicUsize,
    exited: AtomicUsize,
    shutdown_requested: AtomicBool,
}

impl Kernel {
    pub fn new(config: KernelConfig, peers: Peers) -> Arc<Self> {
        let estimator = BurstEstimator::new(config.alpha);
        Arc::new(Self {
            config,
            queues: ProcessQueues::new(),
            waits: WaitList::new(),
            cpus: CpuPool::new(),
            ios: IoPool::new(),
            signals: SignalBus::new(),
            estimator,
            peers,
            suspend_lock: Mutex::new(()),
            pids: PidAllocator::new(),
            created: AtomicUsize::new(0),
            exited: AtomicUsize::new(0),
            shutdown_requested: AtomicBool::new(false),
        })
    }

    // ============================================================
    // 进程生命周期
    // ============================================================

    /// 创建进程并放入 NEW，唤醒长期调度
    pub fn create_process(&self, path: &str, size: usize) -> Pid {
        let pid = self.pids.alloc();
        self.created.fetch_add(1, Ordering::SeqCst);
        let process = Process::new(pid, path, size, self.config.initial_estimate);
        self.queues.admit_new(process);
        log::info!("kernel: pid {} created (path {}, size {} bytes)", pid, path, size);
        self.signals.lts_work.raise();
        pid
    }

    /// 进程进入 READY 后调用
    ///
    /// 同时唤醒等待 CPU 的短期调度，让它重新评估抢占
    pub fn ready_added(&self) {
        self.signals.sts_work.raise();
        self.signals.cpu_available.raise();
    }

    /// 释放运行该进程的 CPU
    pub fn free_cpu(&self, pid: Pid) {
        if let Some(cpu) = self.cpus.release(pid) {
            log::debug!("kernel: cpu {} released by pid {}", cpu.id, pid);
            self.signals.cpu_available.raise();
        }
    }

    /// 离开 EXEC：释放 CPU 并更新突发估算
    pub fn leave_exec(&self, pid: Pid) {
        self.free_cpu(pid);
        let now = Instant::now();
        let estimator = self.estimator;
        self.queues.with(pid, |p| estimator.update(p, now));
    }

    /// 把进程移到 EXIT 并终止
    pub fn kill(&self, pid: Pid) {
        if self.queues.transfer(pid, ProcState::Exit).is_some() {
            self.waits.remove(pid);
            self.terminate(pid);
        }
    }

    /// 终止处理：通知内存释放、记录指标、触发释放内存信号
    ///
    /// 所有创建过的进程都终止后发起全系统关机（只发起一次）
    pub fn terminate(&self, pid: Pid) {
        if let Err(e) = self.peers.memory.delete(pid) {
            log::error!("kernel: pid {} memory release failed: {}", pid, e);
        }
        if let Some(process) = self.queues.destroy(pid) {
            log::info!("kernel: pid {} finished, metrics: {}", pid, process.metrics());
        }
        self.signals.mts_work.raise();

        let exited = self.exited.fetch_add(1, Ordering::SeqCst) + 1;
        if exited == self.created.load(Ordering::SeqCst) {
            self.shutdown();
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn exited_count(&self) -> usize {
        self.exited.load(Ordering::SeqCst)
    }

    // ============================================================
    // 关机
    // ============================================================

    /// 全系统关机：通知所有 CPU、IO 设备和内存服务停止，然后唤醒所有循环退出
    ///
    /// 只执行一次
    pub fn shutdown(&self) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("kernel: every process finished, shutting down");
        self.queues.dump("shutdown");

        for cpu in self.cpus.endpoints() {
            if let Err(e) = self.peers.cpu.shutdown(&cpu) {
                log::warn!("kernel: cpu {} shutdown failed: {}", cpu.id, e);
            }
        }
        for (name, addr) in self.ios.endpoints() {
            if let Err(e) = self.peers.io.shutdown(&name, &addr) {
                log::warn!("kernel: io {}@{} shutdown failed: {}", name, addr, e);
            }
        }
        self.ios.close_all();
        if let Err(e) = self.peers.memory.shutdown() {
            log::warn!("kernel: memory shutdown failed: {}", e);
        }
        self.signals.close_all();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// 阻塞直到内核停机
    pub fn wait_halted(&self) {
        self.signals.halted.wait();
    }
}

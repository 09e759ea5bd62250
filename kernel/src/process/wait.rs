//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 阻塞等待记录
//!
//! 进程处于 BLOCKED / SUSP_BLOCKED（以及短暂的 SUSP_READY）时，
//! 用一条等待记录保存它在等哪个设备、等多久、请求是否已经交给设备。
//! 进程离开这一组状态后记录被移除。
//!
//! 每条记录有一个 ticket，换出计时器按 ticket 绑定记录；
//! 记录被替换或移除后，旧计时器到期时什么都不做。

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use spin::Mutex;

use super::pid::Pid;

bitflags! {
    /// 等待记录标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaitFlags: u8 {
        /// 请求已交给某个设备实例
        const HANDED_OFF  = 0b0000_0001;
        /// 内存转储等待，不是 IO 等待
        const MEMORY_DUMP = 0b0000_0010;
    }
}

/// 一条阻塞等待
#[derive(Debug, Clone)]
pub struct BlockedWait {
    pub pid: Pid,
    /// 设备名（内存转储时为空）
    pub device: String,
    pub duration_ms: u64,
    pub flags: WaitFlags,
    /// 换出计时器绑定的票据
    pub ticket: u64,
}

impl BlockedWait {
    pub fn is_memory_dump(&self) -> bool {
        self.flags.contains(WaitFlags::MEMORY_DUMP)
    }

    pub fn is_handed_off(&self) -> bool {
        self.flags.contains(WaitFlags::HANDED_OFF)
    }
}

/// 等待记录表
pub struct WaitList {
    waits: Mutex<Vec<BlockedWait>>,
    next_ticket: AtomicU64,
}

impl WaitList {
    pub fn new() -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    fn push(&self, pid: Pid, device: &str, duration_ms: u64, flags: WaitFlags) -> BlockedWait {
        let wait = BlockedWait {
            pid,
            device: device.to_string(),
            duration_ms,
            flags,
            ticket: self.next_ticket.fetch_add(1, Ordering::Relaxed),
        };
        let mut waits = self.waits.lock();
        waits.retain(|w| w.pid != pid);
        waits.push(wait.clone());
        wait
    }

    /// 登记 IO 等待
    pub fn add_io(&self, pid: Pid, device: &str, duration_ms: u64) -> BlockedWait {
        self.push(pid, device, duration_ms, WaitFlags::empty())
    }

    /// 登记内存转储等待
    pub fn add_dump(&self, pid: Pid) -> BlockedWait {
        self.push(pid, "", 0, WaitFlags::MEMORY_DUMP | WaitFlags::HANDED_OFF)
    }

    pub fn mark_handed_off(&self, pid: Pid) {
        if let Some(w) = self.waits.lock().iter_mut().find(|w| w.pid == pid) {
            w.flags.insert(WaitFlags::HANDED_OFF);
        }
    }

    /// 撤销交付标记，请求重新等待设备领取
    pub fn requeue(&self, pid: Pid) {
        if let Some(w) = self.waits.lock().iter_mut().find(|w| w.pid == pid) {
            w.flags.remove(WaitFlags::HANDED_OFF);
        }
    }

    /// 领取一条等待指定设备、尚未交付的 IO 请求（按登记顺序）
    pub fn claim_pending(&self, device: &str) -> Option<BlockedWait> {
        let mut waits = self.waits.lock();
        let wait = waits
            .iter_mut()
            .find(|w| w.device == device && !w.flags.intersects(WaitFlags::HANDED_OFF | WaitFlags::MEMORY_DUMP))?;
        wait.flags.insert(WaitFlags::HANDED_OFF);
        Some(wait.clone())
    }

    pub fn get(&self, pid: Pid) -> Option<BlockedWait> {
        self.waits.lock().iter().find(|w| w.pid == pid).cloned()
    }

    /// ticket 是否仍然有效
    pub fn is_current(&self, pid: Pid, ticket: u64) -> bool {
        self.waits
            .lock()
            .iter()
            .any(|w| w.pid == pid && w.ticket == ticket)
    }

    pub fn remove(&self, pid: Pid) -> Option<BlockedWait> {
        let mut waits = self.waits.lock();
        let idx = waits.iter().position(|w| w.pid == pid)?;
        Some(waits.remove(idx))
    }

    /// 按设备名和 PID 移除
    pub fn remove_for(&self, device: &str, pid: Pid) -> Option<BlockedWait> {
        let mut waits = self.waits.lock();
        let idx = waits.iter().position(|w| w.pid == pid && w.device == device)?;
        Some(waits.remove(idx))
    }

    /// 移除所有等待指定设备的记录
    pub fn drain_device(&self, device: &str) -> Vec<BlockedWait> {
        let mut waits = self.waits.lock();
        let (gone, kept): (Vec<_>, Vec<_>) = waits.drain(..).partition(|w| w.device == device);
        *waits = kept;
        gone
    }

    pub fn snapshot(&self) -> Vec<BlockedWait> {
        self.waits.lock().clone()
    }
}

impl Default for WaitList {
    fn default() -> Self {
        Self::new()
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! IO 设备池
//!
//! 设备按 (名字, 地址) 标识，重复注册复用同一个槽位。
//! 每个设备实例有一个交付点：内核往里放 IO 请求，设备的长轮询从里面取。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex as WaitMutex};
use spin::Mutex;

use crate::process::Pid;

/// 交给设备的 IO 请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequest {
    pub pid: Pid,
    pub duration_ms: u64,
}

#[derive(Default)]
struct HandoffState {
    queue: VecDeque<IoRequest>,
    closed: bool,
}

/// 设备交付点
#[derive(Default)]
pub struct Handoff {
    state: WaitMutex<HandoffState>,
    cond: Condvar,
}

impl Handoff {
    /// 放入请求；已关闭时返回 false
    pub fn push(&self, request: IoRequest) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.queue.push_back(request);
        self.cond.notify_one();
        true
    }

    pub fn try_take(&self) -> Option<IoRequest> {
        self.state.lock().queue.pop_front()
    }

    /// 阻塞直到有请求；关闭后返回 None
    pub fn take(&self) -> Option<IoRequest> {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = state.queue.pop_front() {
                return Some(request);
            }
            if state.closed {
                return None;
            }
            self.cond.wait(&mut state);
        }
    }

    pub fn close(&self) {
        self.close_and_drain();
    }

    /// 关闭并取回尚未被设备取走的请求
    pub fn close_and_drain(&self) -> Vec<IoRequest> {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
        state.queue.drain(..).collect()
    }
}

pub struct IoConnection {
    pub name: String,
    pub addr: String,
    pub available: bool,
    pub handoff: Arc<Handoff>,
}

pub struct IoPool {
    devices: Mutex<Vec<IoConnection>>,
}

impl IoPool {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
        }
    }

    /// 注册设备实例，已存在时复用槽位并标记为可用
    ///
    /// 返回 (交付点, 是否新建)
    pub fn register(&self, name: &str, addr: &str) -> (Arc<Handoff>, bool) {
        let mut devices = self.devices.lock();
        if let Some(dev) = devices.iter_mut().find(|d| d.name == name && d.addr == addr) {
            dev.available = true;
            return (dev.handoff.clone(), false);
        }
        let handoff = Arc::new(Handoff::default());
        devices.push(IoConnection {
            name: name.to_string(),
            addr: addr.to_string(),
            available: true,
            handoff: handoff.clone(),
        });
        (handoff, true)
    }

    /// 占用一个同名的空闲设备
    pub fn claim_idle(&self, name: &str) -> Option<Arc<Handoff>> {
        let mut devices = self.devices.lock();
        let dev = devices.iter_mut().find(|d| d.name == name && d.available)?;
        dev.available = false;
        Some(dev.handoff.clone())
    }

    /// 设置设备实例可用性；设备不存在时返回 false
    pub fn set_available(&self, name: &str, addr: &str, available: bool) -> bool {
        let mut devices = self.devices.lock();
        match devices.iter_mut().find(|d| d.name == name && d.addr == addr) {
            Some(dev) => {
                dev.available = available;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str, addr: &str) -> bool {
        self.devices
            .lock()
            .iter()
            .any(|d| d.name == name && d.addr == addr)
    }

    /// 移除设备实例并关闭其交付点
    ///
    /// 返回已交付但设备尚未取走的请求；设备不存在时返回 None
    pub fn remove(&self, name: &str, addr: &str) -> Option<Vec<IoRequest>> {
        let dev = {
            let mut devices = self.devices.lock();
            let idx = devices.iter().position(|d| d.name == name && d.addr == addr)?;
            devices.remove(idx)
        };
        Some(dev.handoff.close_and_drain())
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.devices.lock().iter().any(|d| d.name == name)
    }

    pub fn endpoints(&self) -> Vec<(String, String)> {
        self.devices
            .lock()
            .iter()
            .map(|d| (d.name.clone(), d.addr.clone()))
            .collect()
    }

    /// 关闭所有交付点（长轮询返回关机）
    pub fn close_all(&self) {
        let handoffs: Vec<_> = self.devices.lock().iter().map(|d| d.handoff.clone()).collect();
        for handoff in handoffs {
            handoff.close();
        }
    }
}

impl Default for IoPool {
    fn default() -> Self {
        Self::new()
    }
}

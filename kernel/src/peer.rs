//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 外部协作方接口
//!
//! 内核主动发起的调用：内存服务、CPU、IO 设备。
//! 远程实现在 `net::client`，测试里用进程内替身。
//!
//! 所有调用都是同步的，调用期间不持有任何内核锁。

use std::path::Path;

use crate::error::PeerError;
use crate::process::Pid;

pub type PeerResult = Result<(), PeerError>;

/// 内存服务
pub trait MemoryClient: Send + Sync {
    /// 为进程分配内存并加载代码
    ///
    /// 内存不足时返回 `PeerError::InsufficientMemory`
    fn create(&self, pid: Pid, size: usize, code: &Path) -> PeerResult;

    /// 释放进程占用的内存
    fn delete(&self, pid: Pid) -> PeerResult;

    /// 换出到交换区
    fn suspend(&self, pid: Pid) -> PeerResult;

    /// 换回主存
    fn unsuspend(&self, pid: Pid) -> PeerResult;

    /// 内存转储
    fn dump(&self, pid: Pid) -> PeerResult;

    fn ping(&self) -> PeerResult;

    fn shutdown(&self) -> PeerResult;
}

/// CPU 端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuEndpoint {
    pub id: String,
    pub addr: String,
}

/// CPU 对端
pub trait CpuClient: Send + Sync {
    /// 派发进程到 CPU
    fn dispatch(&self, cpu: &CpuEndpoint, pid: Pid, pc: u64) -> PeerResult;

    /// 请求中断 CPU 上正在运行的进程
    fn interrupt(&self, cpu: &CpuEndpoint, pid: Pid) -> PeerResult;

    fn shutdown(&self, cpu: &CpuEndpoint) -> PeerResult;
}

/// IO 设备对端
///
/// IO 请求通过长轮询交付，内核只需要主动通知关机
pub trait IoClient: Send + Sync {
    fn shutdown(&self, name: &str, addr: &str) -> PeerResult;
}

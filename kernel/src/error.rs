//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 内核错误类型
//!
//! 错误分两类：
//! - `PeerError`: 外部协作方（内存、CPU、IO）返回的失败
//! - `KernelError`: 内核自身向调用方报告的错误
//!
//! 内存不足、派发失败、换入换出失败都是可恢复的，由调度循环稍后重试。

use thiserror::Error;

/// 内核操作结果
pub type KernelResult<T> = Result<T, KernelError>;

/// 外部协作方调用失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// 内存不足 (AdmissionDenied / unsuspend 失败)
    #[error("insufficient memory")]
    InsufficientMemory,

    /// 对端忙或正在关闭
    #[error("peer busy or shutting down")]
    Busy,

    /// 对端拒绝请求
    #[error("peer rejected request: {0}")]
    Rejected(String),

    /// 无法连接对端
    #[error("peer unreachable: {0}")]
    Unreachable(String),
}

/// 内核错误
#[derive(Debug, Error)]
pub enum KernelError {
    /// CPU id 重复注册
    #[error("cpu already registered: {0}")]
    Conflict(String),

    /// 无法识别的系统调用
    #[error("unrecognized opcode: {0}")]
    UnknownOpcode(String),

    /// 报告字段不合法
    #[error("malformed report: {0}")]
    Malformed(String),

    /// 找不到报告引用的进程、CPU 或设备
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] serde_json::Error),
}

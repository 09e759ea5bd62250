//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 内核配置
//!
//! 启动时从 TOML 文件读取，所有字段都有默认值。
//! 调度算法名称在加载时校验，非法名称直接拒绝。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{KernelError, KernelResult};
use crate::process::queue::SelectPolicy;

// ============================================================
// 调度算法
// ============================================================

/// 短期调度算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DispatchPolicy {
    /// 先来先服务
    #[serde(rename = "FIFO")]
    Fifo,
    /// 最短作业优先（非抢占）
    #[serde(rename = "SJF")]
    Sjf,
    /// 最短剩余时间优先（抢占）
    #[serde(rename = "SRT")]
    Srt,
}

impl DispatchPolicy {
    /// READY 队列的选择策略
    pub fn select(self) -> SelectPolicy {
        match self {
            DispatchPolicy::Fifo => SelectPolicy::Fifo,
            DispatchPolicy::Sjf | DispatchPolicy::Srt => SelectPolicy::ByEstimatedBurst,
        }
    }

    pub fn is_preemptive(self) -> bool {
        self == DispatchPolicy::Srt
    }
}

/// NEW / SUSP_READY 的入口算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IngressPolicy {
    #[serde(rename = "FIFO")]
    Fifo,
    /// Process Most Capable of Paging: 声明大小最小者优先
    #[serde(rename = "PMCP")]
    Pmcp,
}

impl IngressPolicy {
    pub fn select(self) -> SelectPolicy {
        match self {
            IngressPolicy::Fifo => SelectPolicy::Fifo,
            IngressPolicy::Pmcp => SelectPolicy::BySize,
        }
    }
}

// ============================================================
// 配置文件
// ============================================================

/// 内核配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// 内核监听地址
    pub listen_addr: String,
    /// 内存服务地址
    pub memory_addr: String,
    pub scheduler_algorithm: DispatchPolicy,
    pub ready_ingress_algorithm: IngressPolicy,
    /// 指数平均系数，取值 [0, 1]
    pub alpha: f64,
    /// 阻塞多久后换出 (毫秒)
    pub suspension_time: u64,
    /// 新进程的初始突发估算 (毫秒)
    pub initial_estimate: u64,
    pub log_level: String,
    /// 进程代码目录
    pub code_folder: PathBuf,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8001".to_string(),
            memory_addr: "127.0.0.1:8002".to_string(),
            scheduler_algorithm: DispatchPolicy::Fifo,
            ready_ingress_algorithm: IngressPolicy::Fifo,
            alpha: 0.5,
            suspension_time: 4500,
            initial_estimate: 10000,
            log_level: "info".to_string(),
            code_folder: PathBuf::from("code"),
        }
    }
}

impl KernelConfig {
    /// 从文件加载配置
    pub fn load(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| KernelError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(text: &str) -> KernelResult<Self> {
        let config: KernelConfig =
            toml::from_str(text).map_err(|e| KernelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> KernelResult<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(KernelError::Config(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(KernelError::Config(format!(
                "unknown log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn suspension_delay(&self) -> Duration {
        Duration::from_millis(self.suspension_time)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// 代码路径相对 code_folder 解析
    pub fn code_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.code_folder.join(path)
    }
}

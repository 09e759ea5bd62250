//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 进程控制块 (PCB)
//!
//! 记录进程身份、当前状态、程序计数器、派发簿记和状态指标。
//! 进程记录归进程表所有，队列中只保存 PID。

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::pid::Pid;

/// 进程状态
///
/// 七个状态，每个状态对应一条队列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum ProcState {
    New = 0,
    Ready = 1,
    Exec = 2,
    Blocked = 3,
    SuspBlocked = 4,
    SuspReady = 5,
    /// 终止状态
    Exit = 6,
}

impl ProcState {
    pub const COUNT: usize = 7;

    pub const ALL: [ProcState; ProcState::COUNT] = [
        ProcState::New,
        ProcState::Ready,
        ProcState::Exec,
        ProcState::Blocked,
        ProcState::SuspBlocked,
        ProcState::SuspReady,
        ProcState::Exit,
    ];

    /// 队列下标
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcState::New => "NEW",
            ProcState::Ready => "READY",
            ProcState::Exec => "EXEC",
            ProcState::Blocked => "BLOCKED",
            ProcState::SuspBlocked => "SUSP_BLOCKED",
            ProcState::SuspReady => "SUSP_READY",
            ProcState::Exit => "EXIT",
        }
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 状态指标
///
/// - `trail`: 按顺序记录 (状态, 进入时刻)
/// - `visits`: 每个状态的进入次数
/// - `time_in`: 每个状态的累计停留时间
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    trail: Vec<(ProcState, Instant)>,
    visits: [u32; ProcState::COUNT],
    time_in: [Duration; ProcState::COUNT],
}

impl Metrics {
    /// 记录一次状态进入
    ///
    /// 上一个状态的停留时间在这里结算
    pub fn record(&mut self, state: ProcState, now: Instant) {
        if let Some(&(prev, since)) = self.trail.last() {
            self.time_in[prev.index()] += now.saturating_duration_since(since);
        }
        self.visits[state.index()] += 1;
        self.trail.push((state, now));
    }

    pub fn visits(&self, state: ProcState) -> u32 {
        self.visits[state.index()]
    }

    pub fn time_in(&self, state: ProcState) -> Duration {
        self.time_in[state.index()]
    }

    pub fn trail(&self) -> &[(ProcState, Instant)] {
        &self.trail
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, state) in ProcState::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{} ({}) ({}ms)",
                state,
                self.visits(*state),
                self.time_in(*state).as_millis()
            )?;
        }
        Ok(())
    }
}

/// 进程记录
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    /// 代码文件路径（相对 code_folder）
    pub path: PathBuf,
    /// 声明的内存大小
    pub size: usize,
    state: ProcState,
    pub pc: u64,

    /// 最近一次进入 EXEC 的时刻
    pub dispatched_at: Option<Instant>,
    /// 最近一次实际突发 (毫秒)
    pub last_burst: u64,
    /// 当前突发估算 (毫秒)
    pub estimated: u64,
    /// MTS 已为其启动换出计时器
    pub timer_running: bool,
    /// 是否驻留在主存
    pub in_memory: bool,

    metrics: Metrics,
}

impl Process {
    /// 创建 NEW 状态的进程
    pub fn new(pid: Pid, path: impl Into<PathBuf>, size: usize, estimate: u64) -> Self {
        let mut metrics = Metrics::default();
        metrics.record(ProcState::New, Instant::now());
        Self {
            pid,
            path: path.into(),
            size,
            state: ProcState::New,
            pc: 0,
            dispatched_at: None,
            last_burst: 0,
            estimated: estimate,
            timer_running: false,
            in_memory: false,
            metrics,
        }
    }

    #[inline]
    pub fn state(&self) -> ProcState {
        self.state
    }

    /// 切换状态并记录指标，返回旧状态
    pub fn set_state(&mut self, state: ProcState, now: Instant) -> ProcState {
        let old = self.state;
        self.state = state;
        self.metrics.record(state, now);
        old
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_process_starts_in_new() {
        let p = Process::new(Pid(3), "prog", 64, 100);
        assert_eq!(p.state(), ProcState::New);
        assert_eq!(p.metrics().visits(ProcState::New), 1);
        assert_eq!(p.metrics().trail().len(), 1);
        assert!(!p.in_memory);
    }

    #[test]
    fn time_is_charged_to_previous_state() {
        let mut m = Metrics::default();
        let t0 = Instant::now();
        m.record(ProcState::New, t0);
        m.record(ProcState::Ready, t0 + Duration::from_millis(30));
        m.record(ProcState::Exec, t0 + Duration::from_millis(50));
        m.record(ProcState::Ready, t0 + Duration::from_millis(120));

        assert_eq!(m.time_in(ProcState::New), Duration::from_millis(30));
        assert_eq!(m.time_in(ProcState::Ready), Duration::from_millis(20));
        assert_eq!(m.time_in(ProcState::Exec), Duration::from_millis(70));
        assert_eq!(m.visits(ProcState::Ready), 2);
        assert_eq!(m.visits(ProcState::Exec), 1);
    }

    #[test]
    fn metrics_display_lists_every_state() {
        let p = Process::new(Pid(0), "a", 1, 1);
        let text = p.metrics().to_string();
        for state in ProcState::ALL {
            assert!(text.contains(state.name()));
        }
        assert!(text.starts_with("NEW (1)"));
    }
}

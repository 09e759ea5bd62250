//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! CPU 突发估算
//!
//! 指数平均：
//! ```text
//! real      = now - dispatched_at
//! estimated = ceil(alpha * real + (1 - alpha) * estimated)
//! ```
//! 每次离开 EXEC（无论原因）都更新一次。

use std::time::Instant;

use crate::process::Process;

/// 计算下一次估算 (毫秒)
pub fn next_estimate(alpha: f64, real_ms: u64, previous_ms: u64) -> u64 {
    let value = alpha * real_ms as f64 + (1.0 - alpha) * previous_ms as f64;
    value.ceil().max(0.0) as u64
}

#[derive(Debug, Clone, Copy)]
pub struct BurstEstimator {
    alpha: f64,
}

impl BurstEstimator {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// 进程离开 EXEC 时调用，返回 (实际突发, 新估算)
    pub fn update(&self, process: &mut Process, now: Instant) -> (u64, u64) {
        let real = elapsed_ms(process, now);
        let previous = process.estimated;
        process.last_burst = real;
        process.estimated = next_estimate(self.alpha, real, previous);
        log::debug!(
            "burst: pid {} real {}ms previous estimate {}ms new estimate {}ms",
            process.pid,
            real,
            previous,
            process.estimated
        );
        (real, process.estimated)
    }

    /// 剩余估算突发，只在 EXEC 中有意义
    pub fn remaining(process: &Process, now: Instant) -> u64 {
        process.estimated.saturating_sub(elapsed_ms(process, now))
    }
}

fn elapsed_ms(process: &Process, now: Instant) -> u64 {
    process
        .dispatched_at
        .map(|t| now.saturating_duration_since(t).as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Pid;
    use std::time::Duration;

    #[test]
    fn formula_matches_for_alpha_range() {
        for &(alpha, real, prev) in &[
            (0.0, 300, 100),
            (1.0, 300, 100),
            (0.5, 300, 100),
            (0.3, 7, 11),
            (0.75, 1000, 0),
        ] {
            let expected = (alpha * real as f64 + (1.0 - alpha) * prev as f64).ceil() as u64;
            assert_eq!(next_estimate(alpha, real, prev), expected);
        }
        // 0.3*7 + 0.7*11 = 9.8 -> 10
        assert_eq!(next_estimate(0.3, 7, 11), 10);
        assert_eq!(next_estimate(0.0, 300, 100), 100);
        assert_eq!(next_estimate(1.0, 300, 100), 300);
    }

    #[test]
    fn update_uses_time_since_dispatch() {
        let estimator = BurstEstimator::new(0.5);
        let mut p = Process::new(Pid(1), "x", 1, 100);
        let t0 = Instant::now();
        p.dispatched_at = Some(t0);
        let (real, estimate) = estimator.update(&mut p, t0 + Duration::from_millis(301));
        assert_eq!(real, 301);
        assert_eq!(estimate, 201);
        assert_eq!(p.last_burst, 301);
        assert_eq!(p.estimated, 201);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let mut p = Process::new(Pid(1), "x", 1, 500);
        let t0 = Instant::now();
        p.dispatched_at = Some(t0);
        assert_eq!(BurstEstimator::remaining(&p, t0 + Duration::from_millis(100)), 400);
        assert_eq!(BurstEstimator::remaining(&p, t0 + Duration::from_millis(900)), 0);
    }
}

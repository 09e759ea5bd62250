//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! PID 管理
//!
//! PID 从 0 开始单调递增，不复用。

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// 进程标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PID 分配器
pub struct PidAllocator {
    next: AtomicU32,
}

impl PidAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
        }
    }

    pub fn alloc(&self) -> Pid {
        Pid(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_sequential_from_zero() {
        let alloc = PidAllocator::new();
        assert_eq!(alloc.alloc(), Pid(0));
        assert_eq!(alloc.alloc(), Pid(1));
        assert_eq!(alloc.alloc(), Pid(2));
    }
}

//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 合并式唤醒信号
//!
//! 单槽通知：
//! - raise(): 非阻塞；已有未消费的通知时直接丢弃（合并）
//! - wait(): 阻塞直到有通知，然后消费它
//!
//! 通知会合并，醒来的一方不能假设具体原因，必须重新检查自己的条件
//! （电平触发语义）。
//!
//! close() 之后所有 wait() 立即返回 false，用于关机时让调度循环退出。

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    closed: bool,
    waiters: usize,
}

/// 单槽合并信号
pub struct Signal {
    name: &'static str,
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl Signal {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SignalState {
                pending: false,
                closed: false,
                waiters: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 发送通知
    ///
    /// 返回 false 表示已有未消费的通知（被合并）或信号已关闭
    pub fn raise(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.pending {
            log::trace!("signal {}: coalesced", self.name);
            return false;
        }
        state.pending = true;
        self.cond.notify_one();
        true
    }

    /// 阻塞等待并消费一个通知
    ///
    /// 返回 false 表示信号已关闭
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        state.waiters += 1;
        while !state.pending && !state.closed {
            self.cond.wait(&mut state);
        }
        state.waiters -= 1;
        if state.closed {
            return false;
        }
        state.pending = false;
        true
    }

    /// 带超时的等待
    ///
    /// 返回 Some(true) 收到通知，Some(false) 超时，None 已关闭
    pub fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        let mut state = self.state.lock();
        state.waiters += 1;
        if !state.pending && !state.closed {
            self.cond.wait_for(&mut state, timeout);
        }
        state.waiters -= 1;
        if state.closed {
            return None;
        }
        let got = state.pending;
        state.pending = false;
        Some(got)
    }

    /// 是否有线程正阻塞在此信号上
    pub fn has_waiters(&self) -> bool {
        self.state.lock().waiters > 0
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 关闭信号，唤醒所有等待者
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }
}

/// 调度循环之间的唤醒信号集合
pub struct SignalBus {
    /// 启动长期调度
    pub lts_start: Signal,
    /// NEW 队列有新进程
    pub lts_work: Signal,
    /// READY 队列有新进程
    pub sts_work: Signal,
    /// 中期调度有事可做（新的阻塞、SUSP_READY、释放内存）
    pub mts_work: Signal,
    /// 重试准入
    pub retry_admission: Signal,
    /// 有 CPU 变为空闲或新注册
    pub cpu_available: Signal,
    /// 内核已停机
    pub halted: Signal,
}

impl SignalBus {
    pub fn new() -> Self {
        Self {
            lts_start: Signal::new("lts-start"),
            lts_work: Signal::new("new-work-for-lts"),
            sts_work: Signal::new("new-work-for-sts"),
            mts_work: Signal::new("new-work-for-mts"),
            retry_admission: Signal::new("retry-admission"),
            cpu_available: Signal::new("cpu-available"),
            halted: Signal::new("halted"),
        }
    }

    /// 唤醒正在等待的那一个
    ///
    /// 两边都没人等时都发，接收方下一次等待时消费
    pub fn raise_either(first: &Signal, second: &Signal) -> bool {
        if first.has_waiters() {
            first.raise()
        } else if second.has_waiters() {
            second.raise()
        } else {
            let a = first.raise();
            let b = second.raise();
            a || b
        }
    }

    /// 关闭所有循环使用的信号，并发出停机通知
    pub fn close_all(&self) {
        for signal in [
            &self.lts_start,
            &self.lts_work,
            &self.sts_work,
            &self.mts_work,
            &self.retry_admission,
            &self.cpu_available,
        ] {
            signal.close();
        }
        self.halted.raise();
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn duplicate_raise_coalesces() {
        let s = Signal::new("t");
        assert!(s.raise());
        assert!(!s.raise());
        assert!(s.wait());
        // 第二次 raise 被丢弃，这里不会再有通知
        assert_eq!(s.wait_timeout(Duration::from_millis(20)), Some(false));
    }

    #[test]
    fn waiter_must_recheck_after_wakeup() {
        // 两次生产只产生一次唤醒，消费方靠重新检查队列长度拿到全部工作
        let s = Arc::new(Signal::new("t"));
        let work = Arc::new(Mutex::new(0u32));
        {
            *work.lock() += 1;
            s.raise();
            *work.lock() += 1;
            s.raise();
        }
        assert!(s.wait());
        let mut drained = 0;
        while *work.lock() > 0 {
            *work.lock() -= 1;
            drained += 1;
        }
        assert_eq!(drained, 2);
    }

    #[test]
    fn wait_blocks_until_raise() {
        let s = Arc::new(Signal::new("t"));
        let waiter = {
            let s = s.clone();
            thread::spawn(move || s.wait())
        };
        while !s.has_waiters() {
            thread::yield_now();
        }
        s.raise();
        assert!(waiter.join().unwrap());
        assert!(!s.is_pending());
    }

    #[test]
    fn close_releases_waiters() {
        let s = Arc::new(Signal::new("t"));
        let waiter = {
            let s = s.clone();
            thread::spawn(move || s.wait())
        };
        while !s.has_waiters() {
            thread::yield_now();
        }
        s.close();
        assert!(!waiter.join().unwrap());
        assert!(!s.raise());
        assert_eq!(s.wait_timeout(Duration::from_millis(1)), None);
    }

    #[test]
    fn raise_either_prefers_the_waiting_side() {
        let bus = Arc::new(SignalBus::new());
        assert!(SignalBus::raise_either(&bus.retry_admission, &bus.lts_work));
        assert!(bus.lts_work.is_pending());
        assert!(bus.retry_admission.is_pending());
        assert!(bus.lts_work.wait());
        assert!(bus.retry_admission.wait());

        let waiter = {
            let bus = bus.clone();
            thread::spawn(move || bus.retry_admission.wait())
        };
        while !bus.retry_admission.has_waiters() {
            thread::yield_now();
        }
        assert!(SignalBus::raise_either(&bus.retry_admission, &bus.lts_work));
        assert!(waiter.join().unwrap());
        assert!(!bus.lts_work.is_pending());
    }
}

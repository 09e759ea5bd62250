//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 状态队列管理
//!
//! 每个状态一条队列，各自加锁；进程记录统一保存在进程表中，
//! 队列里只存 PID。
//!
//! 锁顺序：队列锁 -> 进程表锁。持有进程表锁时绝不获取队列锁。
//!
//! 跨队列的"移动"由两次独立的加锁操作组成，不是原子的；
//! 正确性依赖单一所有权：只有当前负责该进程的循环或处理函数
//! 才会推进它的下一次状态转换。

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use spin::Mutex;

use super::pid::Pid;
use super::task::{ProcState, Process};

/// 队列选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectPolicy {
    /// 按到达顺序
    Fifo,
    /// 声明大小升序
    BySize,
    /// 当前突发估算升序
    ByEstimatedBurst,
}

/// 进程表 + 七条状态队列
pub struct ProcessQueues {
    table: Mutex<BTreeMap<Pid, Process>>,
    queues: [Mutex<VecDeque<Pid>>; ProcState::COUNT],
}

impl ProcessQueues {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(BTreeMap::new()),
            queues: [(); ProcState::COUNT].map(|_| Mutex::new(VecDeque::new())),
        }
    }

    #[inline]
    fn queue(&self, state: ProcState) -> &Mutex<VecDeque<Pid>> {
        &self.queues[state.index()]
    }

    /// 新进程加入进程表并进入 NEW 队列
    pub fn admit_new(&self, process: Process) -> Pid {
        let pid = process.pid;
        self.table.lock().insert(pid, process);
        self.queue(ProcState::New).lock().push_back(pid);
        log::debug!("queue NEW: pid {} admitted", pid);
        pid
    }

    /// 设置进程状态并追加到对应队列尾部
    ///
    /// 返回旧状态；进程不在进程表中时返回 None
    pub fn enqueue(&self, state: ProcState, pid: Pid) -> Option<ProcState> {
        let old = {
            let mut table = self.table.lock();
            let process = table.get_mut(&pid)?;
            process.set_state(state, Instant::now())
        };
        self.queue(state).lock().push_back(pid);

        if old != state {
            log::info!("pid {}: {} -> {}", pid, old, state);
        } else {
            log::info!("pid {}: stays in {}", pid, state);
        }
        log::debug!("queue {}: {:?}", state, self.pids(state));
        Some(old)
    }

    /// 按策略取出最优进程
    pub fn dequeue(&self, state: ProcState, policy: SelectPolicy) -> Option<Pid> {
        let mut queue = self.queue(state).lock();
        self.reorder(&mut queue, policy);
        queue.pop_front()
    }

    /// 按策略查看最优进程，不移除
    pub fn search(&self, state: ProcState, policy: SelectPolicy) -> Option<Pid> {
        self.search_nth(state, policy, 0)
    }

    /// 按策略排序后的第 n 个进程（从 0 开始），不移除
    pub fn search_nth(&self, state: ProcState, policy: SelectPolicy, n: usize) -> Option<Pid> {
        let mut queue = self.queue(state).lock();
        self.reorder(&mut queue, policy);
        queue.get(n).copied()
    }

    /// 原地重排
    ///
    /// 稳定排序：键相同的进程保持到达顺序
    fn reorder(&self, queue: &mut VecDeque<Pid>, policy: SelectPolicy) {
        if queue.len() < 2 {
            return;
        }
        let table = self.table.lock();
        let key = |pid: &Pid| -> u64 {
            match (policy, table.get(pid)) {
                (SelectPolicy::BySize, Some(p)) => p.size as u64,
                (SelectPolicy::ByEstimatedBurst, Some(p)) => p.estimated,
                _ => 0,
            }
        };
        match policy {
            SelectPolicy::Fifo => {}
            SelectPolicy::BySize | SelectPolicy::ByEstimatedBurst => {
                queue.make_contiguous().sort_by_key(key);
            }
        }
    }

    /// 按 PID 移除
    ///
    /// 找不到时返回 None，视为重复或过期事件
    pub fn remove(&self, state: ProcState, pid: Pid) -> Option<Pid> {
        let mut queue = self.queue(state).lock();
        match queue.iter().position(|p| *p == pid) {
            Some(idx) => queue.remove(idx),
            None => {
                log::info!("queue {}: pid {} not present", state, pid);
                None
            }
        }
    }

    /// 把进程从当前状态移到 `to`
    ///
    /// 当前队列中找不到时什么都不做
    pub fn transfer(&self, pid: Pid, to: ProcState) -> Option<ProcState> {
        let from = self.state_of(pid)?;
        self.remove(from, pid)?;
        self.enqueue(to, pid)
    }

    /// 仅当进程处于 `from` 时移到 `to`
    pub fn transfer_from(&self, from: ProcState, pid: Pid, to: ProcState) -> bool {
        if self.remove(from, pid).is_none() {
            return false;
        }
        self.enqueue(to, pid).is_some()
    }

    pub fn is_empty(&self, state: ProcState) -> bool {
        self.queue(state).lock().is_empty()
    }

    pub fn len(&self, state: ProcState) -> usize {
        self.queue(state).lock().len()
    }

    /// 队列快照
    pub fn pids(&self, state: ProcState) -> Vec<Pid> {
        self.queue(state).lock().iter().copied().collect()
    }

    /// 在进程表锁内访问进程记录
    pub fn with<R>(&self, pid: Pid, f: impl FnOnce(&mut Process) -> R) -> Option<R> {
        self.table.lock().get_mut(&pid).map(f)
    }

    pub fn get(&self, pid: Pid) -> Option<Process> {
        self.table.lock().get(&pid).cloned()
    }

    pub fn state_of(&self, pid: Pid) -> Option<ProcState> {
        self.table.lock().get(&pid).map(|p| p.state())
    }

    /// 销毁已终止进程：移出 EXIT 队列和进程表
    pub fn destroy(&self, pid: Pid) -> Option<Process> {
        self.remove(ProcState::Exit, pid);
        self.table.lock().remove(&pid)
    }

    /// 检查单一所有权：每个进程恰好在一条队列中，且记录状态与队列一致
    ///
    /// 只在静止状态下有意义
    pub fn audit(&self) -> Result<(), String> {
        let mut seen: BTreeMap<Pid, ProcState> = BTreeMap::new();
        for state in ProcState::ALL {
            for pid in self.pids(state) {
                if let Some(other) = seen.insert(pid, state) {
                    return Err(format!("pid {} queued in both {} and {}", pid, other, state));
                }
            }
        }
        let table = self.table.lock();
        for (pid, process) in table.iter() {
            match seen.get(pid) {
                Some(state) if *state == process.state() => {}
                Some(state) => {
                    return Err(format!(
                        "pid {} recorded as {} but queued in {}",
                        pid,
                        process.state(),
                        state
                    ))
                }
                None => return Err(format!("pid {} is in no queue", pid)),
            }
        }
        if let Some(pid) = seen.keys().find(|pid| !table.contains_key(pid)) {
            return Err(format!("pid {} queued without a record", pid));
        }
        Ok(())
    }

    /// 打印所有队列
    pub fn dump(&self, reason: &str) {
        log::info!("queues: dump ({})", reason);
        for state in ProcState::ALL {
            let entries: Vec<String> = self
                .pids(state)
                .into_iter()
                .map(|pid| {
                    let burst = self.with(pid, |p| p.estimated).unwrap_or(0);
                    format!("{}(burst {}ms)", pid, burst)
                })
                .collect();
            log::info!("queues: {:<12} [{}]", state.name(), entries.join(", "));
        }
    }
}

impl Default for ProcessQueues {
    fn default() -> Self {
        Self::new()
    }
}

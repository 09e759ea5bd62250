//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 系统调用与派发结果处理
//!
//! CPU 上报的两类事件：
//! - 派发结果：进程被中断或执行结束
//! - 系统调用：IO / INIT_PROC / DUMP_MEMORY / EXIT
//!
//! 每个事件在各自的请求线程上同步处理，只修改队列并发送信号，
//! 真正的调度决策留给调度循环。

pub mod io;

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::process::{Pid, ProcState};

/// 派发结果原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchReason {
    Interrupt,
    Exit,
}

/// 系统调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syscall {
    /// 在设备上阻塞 duration_ms 毫秒
    Io { device: String, duration_ms: u64 },
    /// 创建新进程，调用者不受影响
    InitProc { path: String, size: usize },
    /// 请求内存转储
    DumpMemory,
    Exit,
}

impl Syscall {
    /// 由操作码和字符串参数构造
    pub fn parse(opcode: &str, args: &[String]) -> KernelResult<Self> {
        match opcode {
            "IO" => {
                let (device, duration) = two_args(opcode, args)?;
                let duration_ms = duration
                    .parse()
                    .map_err(|_| KernelError::Malformed(format!("IO duration {:?}", duration)))?;
                Ok(Syscall::Io {
                    device: device.to_string(),
                    duration_ms,
                })
            }
            "INIT_PROC" => {
                let (path, size) = two_args(opcode, args)?;
                let size = size
                    .parse()
                    .map_err(|_| KernelError::Malformed(format!("INIT_PROC size {:?}", size)))?;
                Ok(Syscall::InitProc {
                    path: path.to_string(),
                    size,
                })
            }
            "DUMP_MEMORY" => Ok(Syscall::DumpMemory),
            "EXIT" => Ok(Syscall::Exit),
            other => Err(KernelError::UnknownOpcode(other.to_string())),
        }
    }

    pub fn opcode(&self) -> &'static str {
        match self {
            Syscall::Io { .. } => "IO",
            Syscall::InitProc { .. } => "INIT_PROC",
            Syscall::DumpMemory => "DUMP_MEMORY",
            Syscall::Exit => "EXIT",
        }
    }
}

fn two_args<'a>(opcode: &str, args: &'a [String]) -> KernelResult<(&'a str, &'a str)> {
    match args {
        [a, b, ..] => Ok((a.as_str(), b.as_str())),
        _ => Err(KernelError::Malformed(format!(
            "{} needs 2 arguments, got {}",
            opcode,
            args.len()
        ))),
    }
}

impl Kernel {
    // ============================================================
    // CPU 上报
    // ============================================================

    /// CPU 注册；id 重复时返回 Conflict
    pub fn register_cpu(&self, id: &str, addr: &str) -> KernelResult<()> {
        self.cpus.register(id, addr)?;
        log::info!("intake: cpu {} registered at {}", id, addr);
        self.signals.cpu_available.raise();
        Ok(())
    }

    /// 派发结果
    ///
    /// 进程已不在 EXEC 时视为过期上报，忽略
    pub fn dispatch_result(&self, pid: Pid, pc: u64, reason: DispatchReason) -> KernelResult<()> {
        if self.queues.remove(ProcState::Exec, pid).is_none() {
            log::info!("intake: stale dispatch result for pid {} ignored", pid);
            return Ok(());
        }
        self.queues.with(pid, |p| p.pc = pc);
        self.leave_exec(pid);

        match reason {
            DispatchReason::Interrupt => {
                log::info!("intake: pid {} interrupted at pc {}", pid, pc);
                self.queues.enqueue(ProcState::Ready, pid);
                self.ready_added();
            }
            DispatchReason::Exit => {
                log::info!("intake: pid {} exited at pc {}", pid, pc);
                self.queues.enqueue(ProcState::Exit, pid);
                self.terminate(pid);
            }
        }
        Ok(())
    }

    /// 系统调用
    ///
    /// 进程由上报 CPU 当前运行的进程确定；与上报的 pid 不一致时返回 NotFound
    pub fn syscall(self: &Arc<Self>, cpu_id: &str, pid: Pid, pc: u64, call: Syscall) -> KernelResult<()> {
        match self.cpus.running_on(cpu_id) {
            Some(running) if running == pid => {}
            Some(running) => {
                return Err(KernelError::NotFound(format!(
                    "cpu {} runs pid {}, not pid {}",
                    cpu_id, running, pid
                )))
            }
            None => {
                return Err(KernelError::NotFound(format!("cpu {} runs no process", cpu_id)));
            }
        }
        self.queues.with(pid, |p| p.pc = pc);
        log::info!("intake: pid {} syscall {}", pid, call.opcode());

        match call {
            Syscall::Io { device, duration_ms } => self.block_on_io(pid, &device, duration_ms),
            Syscall::InitProc { path, size } => {
                self.create_process(&path, size);
                Ok(())
            }
            Syscall::DumpMemory => self.dump_memory(pid),
            Syscall::Exit => {
                if self.queues.remove(ProcState::Exec, pid).is_none() {
                    return Err(KernelError::NotFound(format!("pid {} not executing", pid)));
                }
                self.leave_exec(pid);
                self.queues.enqueue(ProcState::Exit, pid);
                self.terminate(pid);
                Ok(())
            }
        }
    }

    /// EXEC -> BLOCKED，等待内存转储完成
    fn dump_memory(self: &Arc<Self>, pid: Pid) -> KernelResult<()> {
        if self.queues.remove(ProcState::Exec, pid).is_none() {
            return Err(KernelError::NotFound(format!("pid {} not executing", pid)));
        }
        self.leave_exec(pid);
        self.queues.enqueue(ProcState::Blocked, pid);
        self.waits.add_dump(pid);

        let kernel = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("dump-{}", pid))
            .spawn(move || kernel.finish_dump(pid));
        if let Err(e) = spawned {
            log::error!("intake: cannot start memory dump for pid {}: {}", pid, e);
            self.kill(pid);
            return Err(e.into());
        }
        Ok(())
    }

    fn finish_dump(&self, pid: Pid) {
        match self.peers.memory.dump(pid) {
            Ok(()) => {
                self.waits.remove(pid);
                if self
                    .queues
                    .transfer_from(ProcState::Blocked, pid, ProcState::Ready)
                {
                    log::info!("intake: pid {} memory dump done", pid);
                    self.ready_added();
                }
            }
            Err(e) => {
                log::error!("intake: pid {} memory dump failed: {}", pid, e);
                self.kill(pid);
            }
        }
    }
}

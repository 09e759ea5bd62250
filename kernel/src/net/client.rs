//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 出站客户端
//!
//! 每次调用新建一个连接，发送一行请求，读取一行应答。
//! 调用是同步的，没有超时。

use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::path::Path;

use crate::error::PeerError;
use crate::net::wire::{self, PeerReply, PeerRequest};
use crate::peer::{CpuClient, CpuEndpoint, IoClient, MemoryClient, PeerResult};
use crate::process::Pid;

/// 向 `addr` 发送一条请求
pub fn call(addr: &str, request: &PeerRequest) -> Result<PeerReply, PeerError> {
    let stream = TcpStream::connect(addr).map_err(|e| unreachable_at(addr, e))?;
    let reader_half = stream.try_clone().map_err(|e| unreachable_at(addr, e))?;
    let mut writer = BufWriter::new(stream);
    wire::write_line(&mut writer, request).map_err(|e| unreachable_at(addr, e))?;

    let mut reader = BufReader::new(reader_half);
    match wire::read_line::<_, PeerReply>(&mut reader) {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(unreachable_at(addr, "connection closed")),
        Err(e) => Err(unreachable_at(addr, e)),
    }
}

fn unreachable_at(addr: &str, reason: impl fmt::Display) -> PeerError {
    PeerError::Unreachable(format!("{}: {}", addr, reason))
}

fn send(addr: &str, request: PeerRequest) -> PeerResult {
    call(addr, &request)?.into_result()
}

/// 内存服务
pub struct RemoteMemory {
    addr: String,
}

impl RemoteMemory {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl MemoryClient for RemoteMemory {
    fn create(&self, pid: Pid, size: usize, code: &Path) -> PeerResult {
        let code = fs::read_to_string(code)
            .map_err(|e| PeerError::Rejected(format!("cannot read {}: {}", code.display(), e)))?;
        send(&self.addr, PeerRequest::MemCreate { pid, size, code })
    }

    fn delete(&self, pid: Pid) -> PeerResult {
        send(&self.addr, PeerRequest::MemDelete { pid })
    }

    fn suspend(&self, pid: Pid) -> PeerResult {
        send(&self.addr, PeerRequest::MemSuspend { pid })
    }

    fn unsuspend(&self, pid: Pid) -> PeerResult {
        send(&self.addr, PeerRequest::MemUnsuspend { pid })
    }

    fn dump(&self, pid: Pid) -> PeerResult {
        send(&self.addr, PeerRequest::MemDump { pid })
    }

    fn ping(&self) -> PeerResult {
        send(&self.addr, PeerRequest::Ping)
    }

    fn shutdown(&self) -> PeerResult {
        send(&self.addr, PeerRequest::Shutdown)
    }
}

/// CPU 客户端，地址来自注册信息
#[derive(Default)]
pub struct RemoteCpu;

impl CpuClient for RemoteCpu {
    fn dispatch(&self, cpu: &CpuEndpoint, pid: Pid, pc: u64) -> PeerResult {
        send(&cpu.addr, PeerRequest::Dispatch { pid, pc })
    }

    fn interrupt(&self, cpu: &CpuEndpoint, pid: Pid) -> PeerResult {
        send(&cpu.addr, PeerRequest::Interrupt { pid })
    }

    fn shutdown(&self, cpu: &CpuEndpoint) -> PeerResult {
        send(&cpu.addr, PeerRequest::Shutdown)
    }
}

/// IO 设备客户端
#[derive(Default)]
pub struct RemoteIo;

impl IoClient for RemoteIo {
    fn shutdown(&self, _name: &str, addr: &str) -> PeerResult {
        send(addr, PeerRequest::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::thread;

    /// 只应答一次的假对端
    fn one_shot(reply: PeerReply) -> (String, thread::JoinHandle<PeerRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut writer = BufWriter::new(stream);
            wire::write_line(&mut writer, &reply).unwrap();
            serde_json::from_str(line.trim()).unwrap()
        });
        (addr, handle)
    }

    #[test]
    fn dispatch_round_trip() {
        let (addr, peer) = one_shot(PeerReply::Ok);
        let cpu = CpuEndpoint {
            id: "c1".into(),
            addr,
        };
        RemoteCpu.dispatch(&cpu, Pid(5), 12).unwrap();
        assert_eq!(peer.join().unwrap(), PeerRequest::Dispatch { pid: Pid(5), pc: 12 });
    }

    #[test]
    fn insufficient_memory_surfaces_as_peer_error() {
        let (addr, peer) = one_shot(PeerReply::InsufficientMemory);
        let memory = RemoteMemory::new(addr);
        assert_eq!(memory.unsuspend(Pid(2)), Err(PeerError::InsufficientMemory));
        assert_eq!(peer.join().unwrap(), PeerRequest::MemUnsuspend { pid: Pid(2) });
    }

    #[test]
    fn unreachable_peer_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(matches!(RemoteIo.shutdown("disk", &addr), Err(PeerError::Unreachable(_))));
    }

    #[test]
    fn missing_code_file_is_rejected_locally() {
        let memory = RemoteMemory::new("127.0.0.1:1");
        let err = memory
            .create(Pid(0), 16, Path::new("/nonexistent/osim/code"))
            .unwrap_err();
        assert!(matches!(err, PeerError::Rejected(_)));
    }
}

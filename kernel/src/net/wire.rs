//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 线上消息格式
//!
//! 每条消息是一行 JSON，按 `op` / `status` 字段区分类型：
//! ```text
//! -> {"op":"register_cpu","id":"cpu1","addr":"127.0.0.1:8004"}
//! <- {"status":"ok"}
//! ```

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult, PeerError};
use crate::pool::IoRequest;
use crate::process::Pid;
use crate::syscall::DispatchReason;

// ============================================================
// 内核入站
// ============================================================

/// CPU / IO / 启动器发给内核的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum KernelRequest {
    RegisterCpu {
        id: String,
        addr: String,
    },
    DispatchResult {
        pid: Pid,
        pc: u64,
        reason: DispatchReason,
    },
    Syscall {
        cpu_id: String,
        pid: Pid,
        pc: u64,
        opcode: String,
        #[serde(default)]
        args: Vec<String>,
    },
    RegisterIo {
        name: String,
        addr: String,
    },
    IoFinished {
        name: String,
        addr: String,
        pid: Pid,
    },
    IoDisconnected {
        name: String,
        addr: String,
        #[serde(default)]
        pid: Option<Pid>,
    },
    Ping,
}

/// 内核的应答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KernelReply {
    Ok,
    Conflict { message: String },
    BadRequest { message: String },
    NotFound { message: String },
    IoRequest { pid: Pid, duration_ms: u64 },
    Shutdown,
}

impl From<IoRequest> for KernelReply {
    fn from(request: IoRequest) -> Self {
        KernelReply::IoRequest {
            pid: request.pid,
            duration_ms: request.duration_ms,
        }
    }
}

impl From<KernelError> for KernelReply {
    fn from(err: KernelError) -> Self {
        let message = err.to_string();
        match err {
            KernelError::Conflict(_) => KernelReply::Conflict { message },
            KernelError::NotFound(_) => KernelReply::NotFound { message },
            _ => KernelReply::BadRequest { message },
        }
    }
}

// ============================================================
// 内核出站
// ============================================================

/// 内核发给内存 / CPU / IO 的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PeerRequest {
    MemCreate { pid: Pid, size: usize, code: String },
    MemDelete { pid: Pid },
    MemSuspend { pid: Pid },
    MemUnsuspend { pid: Pid },
    MemDump { pid: Pid },
    Dispatch { pid: Pid, pc: u64 },
    Interrupt { pid: Pid },
    Shutdown,
    Ping,
}

/// 对端的应答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeerReply {
    Ok,
    InsufficientMemory,
    Busy,
    Error { message: String },
}

impl PeerReply {
    pub fn into_result(self) -> Result<(), PeerError> {
        match self {
            PeerReply::Ok => Ok(()),
            PeerReply::InsufficientMemory => Err(PeerError::InsufficientMemory),
            PeerReply::Busy => Err(PeerError::Busy),
            PeerReply::Error { message } => Err(PeerError::Rejected(message)),
        }
    }
}

// ============================================================
// 分帧
// ============================================================

/// 写一条消息（一行）
pub fn write_line<W: Write, T: Serialize>(writer: &mut W, message: &T) -> KernelResult<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

/// 读一条消息；对端关闭连接时返回 None
pub fn read_line<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> KernelResult<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    if line.is_empty() {
        return Err(KernelError::Malformed("empty message".to_string()));
    }
    Ok(Some(serde_json::from_str(line)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn syscall_request_layout() {
        let text = r#"{"op":"syscall","cpu_id":"c1","pid":3,"pc":7,"opcode":"IO","args":["disk","250"]}"#;
        let req: KernelRequest = serde_json::from_str(text).unwrap();
        assert_eq!(
            req,
            KernelRequest::Syscall {
                cpu_id: "c1".into(),
                pid: Pid(3),
                pc: 7,
                opcode: "IO".into(),
                args: vec!["disk".into(), "250".into()],
            }
        );
    }

    #[test]
    fn missing_optional_fields_default() {
        let req: KernelRequest =
            serde_json::from_str(r#"{"op":"io_disconnected","name":"disk","addr":"a"}"#).unwrap();
        assert_eq!(
            req,
            KernelRequest::IoDisconnected {
                name: "disk".into(),
                addr: "a".into(),
                pid: None
            }
        );
        let req: KernelRequest =
            serde_json::from_str(r#"{"op":"syscall","cpu_id":"c","pid":0,"pc":0,"opcode":"EXIT"}"#).unwrap();
        assert!(matches!(req, KernelRequest::Syscall { args, .. } if args.is_empty()));
    }

    #[test]
    fn io_request_reply_is_tagged() {
        let reply = KernelReply::from(IoRequest {
            pid: Pid(4),
            duration_ms: 90,
        });
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"status":"io_request","pid":4,"duration_ms":90}"#
        );
    }

    #[test]
    fn errors_map_to_reply_kinds() {
        assert!(matches!(
            KernelReply::from(KernelError::Conflict("c1".into())),
            KernelReply::Conflict { .. }
        ));
        assert!(matches!(
            KernelReply::from(KernelError::UnknownOpcode("X".into())),
            KernelReply::BadRequest { .. }
        ));
        assert!(matches!(
            KernelReply::from(KernelError::NotFound("p".into())),
            KernelReply::NotFound { .. }
        ));
    }

    #[test]
    fn peer_reply_maps_to_peer_error() {
        assert_eq!(PeerReply::Ok.into_result(), Ok(()));
        assert_eq!(
            PeerReply::InsufficientMemory.into_result(),
            Err(PeerError::InsufficientMemory)
        );
        assert_eq!(PeerReply::Busy.into_result(), Err(PeerError::Busy));
    }

    #[test]
    fn framing_reads_one_message_per_line() {
        let mut buf = Vec::new();
        write_line(&mut buf, &PeerRequest::Dispatch { pid: Pid(1), pc: 2 }).unwrap();
        write_line(&mut buf, &PeerRequest::Shutdown).unwrap();
        let mut reader = Cursor::new(buf);
        let first: Option<PeerRequest> = read_line(&mut reader).unwrap();
        assert_eq!(first, Some(PeerRequest::Dispatch { pid: Pid(1), pc: 2 }));
        let second: Option<PeerRequest> = read_line(&mut reader).unwrap();
        assert_eq!(second, Some(PeerRequest::Shutdown));
        let end: Option<PeerRequest> = read_line(&mut reader).unwrap();
        assert_eq!(end, None);
    }
}

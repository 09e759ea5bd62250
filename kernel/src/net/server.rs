//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 入站服务
//!
//! 每个连接一个线程；连接上可以连续发送多条请求，
//! 每条请求一行，应答也是一行。

use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::error::KernelResult;
use crate::kernel::Kernel;
use crate::net::wire::{self, KernelReply, KernelRequest};
use crate::syscall::Syscall;

/// 绑定地址并在后台线程接受连接
pub fn serve(kernel: Arc<Kernel>, addr: &str) -> KernelResult<thread::JoinHandle<()>> {
    let listener = TcpListener::bind(addr)?;
    log::info!("net: listening on {}", listener.local_addr()?);
    let handle = thread::Builder::new()
        .name("net-accept".to_string())
        .spawn(move || accept_loop(kernel, listener))?;
    Ok(handle)
}

fn accept_loop(kernel: Arc<Kernel>, listener: TcpListener) {
    for stream in listener.incoming() {
        if kernel.is_shutting_down() {
            break;
        }
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("net: accept failed: {}", e);
                continue;
            }
        };
        let k = kernel.clone();
        let spawned = thread::Builder::new()
            .name("net-conn".to_string())
            .spawn(move || {
                if let Err(e) = handle_connection(&k, stream) {
                    log::debug!("net: connection closed: {}", e);
                }
            });
        if let Err(e) = spawned {
            log::error!("net: cannot start connection thread: {}", e);
        }
    }
    log::info!("net: accept loop stopped");
}

fn handle_connection(kernel: &Arc<Kernel>, stream: TcpStream) -> KernelResult<()> {
    let peer = stream.peer_addr()?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    loop {
        let reply = match wire::read_line::<_, KernelRequest>(&mut reader) {
            Ok(Some(request)) => {
                log::trace!("net: {} -> {:?}", peer, request);
                handle(kernel, request)
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("net: bad request from {}: {}", peer, e);
                KernelReply::from(e)
            }
        };
        wire::write_line(&mut writer, &reply)?;
    }
}

/// 把一条请求交给内核处理，返回应答
pub fn handle(kernel: &Arc<Kernel>, request: KernelRequest) -> KernelReply {
    let result = match request {
        KernelRequest::RegisterCpu { id, addr } => kernel.register_cpu(&id, &addr),
        KernelRequest::DispatchResult { pid, pc, reason } => kernel.dispatch_result(pid, pc, reason),
        KernelRequest::Syscall {
            cpu_id,
            pid,
            pc,
            opcode,
            args,
        } => Syscall::parse(&opcode, &args).and_then(|call| kernel.syscall(&cpu_id, pid, pc, call)),
        KernelRequest::RegisterIo { name, addr } => {
            return match kernel.register_io(&name, &addr) {
                Some(request) => request.into(),
                None => KernelReply::Shutdown,
            };
        }
        KernelRequest::IoFinished { name, addr, pid } => kernel.io_finished(&name, &addr, pid),
        KernelRequest::IoDisconnected { name, addr, pid } => kernel.io_disconnected(&name, &addr, pid),
        KernelRequest::Ping => Ok(()),
    };
    match result {
        Ok(()) => KernelReply::Ok,
        Err(e) => {
            log::warn!("net: request rejected: {}", e);
            e.into()
        }
    }
}

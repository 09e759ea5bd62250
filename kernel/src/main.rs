//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核服务入口
//!
//! 启动顺序：
//! 1. 解析命令行，加载配置，初始化日志
//! 2. 建立内核上下文，启动入站服务
//! 3. 等待内存服务就绪
//! 4. 创建初始进程，启动三个调度循环
//! 5. 按回车后开始准入，阻塞直到全部进程结束

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use osim_kernel::cmdline;
use osim_kernel::config::KernelConfig;
use osim_kernel::console;
use osim_kernel::error::KernelResult;
use osim_kernel::net::{self, RemoteCpu, RemoteIo, RemoteMemory};
use osim_kernel::peer::MemoryClient;
use osim_kernel::sched;
use osim_kernel::{Kernel, Peers};

/// 等待内存服务时的重试间隔
const MEMORY_RETRY: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("osim-kernel: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> KernelResult<()> {
    let cmd = cmdline::parse(std::env::args().skip(1))?;
    let config = KernelConfig::load(&cmd.config)?;
    console::init(config.level_filter());
    log::info!("osim-kernel v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "main: config {} (dispatch {:?}, ingress {:?}, alpha {}, suspension {}ms)",
        cmd.config.display(),
        config.scheduler_algorithm,
        config.ready_ingress_algorithm,
        config.alpha,
        config.suspension_time
    );

    let memory = Arc::new(RemoteMemory::new(config.memory_addr.clone()));
    let peers = Peers {
        memory: memory.clone(),
        cpu: Arc::new(RemoteCpu),
        io: Arc::new(RemoteIo),
    };
    let listen_addr = config.listen_addr.clone();
    let kernel = Kernel::new(config, peers);

    net::serve(kernel.clone(), &listen_addr)?;

    log::info!("main: waiting for memory at {}", kernel.config.memory_addr);
    while let Err(e) = memory.ping() {
        log::debug!("main: memory not ready: {}", e);
        thread::sleep(MEMORY_RETRY);
    }
    log::info!("main: memory is up");

    kernel.create_process(&cmd.program, cmd.size);
    let loops = sched::start(&kernel)?;

    println!("Press Enter to start the long-term scheduler...");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    sched::start_admission(&kernel);

    kernel.wait_halted();
    for handle in loops {
        if handle.join().is_err() {
            log::error!("main: scheduler thread panicked");
        }
    }
    log::info!(
        "main: {} processes created, {} finished, bye",
        kernel.created_count(),
        kernel.exited_count()
    );
    Ok(())
}

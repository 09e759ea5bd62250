//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 控制台日志输出
//!
//! 实现 `log::Log`，每条记录一行写到 stderr：
//! `[  12.345] INFO  sts: pid 3 dispatched to cpu-1`

use std::io::Write;
use std::time::Instant;

use lazy_static::lazy_static;
use log::{Level, LevelFilter, Log, Metadata, Record};

lazy_static! {
    /// 内核启动时刻，日志时间戳以此为基准
    static ref BOOT_INSTANT: Instant = Instant::now();
}

pub struct Console;

static CONSOLE: Console = Console;

impl Log for Console {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = BOOT_INSTANT.elapsed();
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        // stderr 写失败时无处可报，丢弃
        let _ = writeln!(
            out,
            "[{:>5}.{:03}] {:<5} {}",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
            level_tag(record.level()),
            record.args()
        );
    }

    fn flush(&self) {
        // 同上，忽略 flush 错误
        let _ = std::io::stderr().flush();
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// 安装控制台日志
///
/// 重复调用只更新日志级别
pub fn init(level: LevelFilter) {
    lazy_static::initialize(&BOOT_INSTANT);
    let level = if cfg!(feature = "debug_log") && level < LevelFilter::Debug {
        LevelFilter::Debug
    } else {
        level
    };
    // 已安装过时 set_logger 返回错误，只需更新级别
    let _ = log::set_logger(&CONSOLE);
    log::set_max_level(level);
}

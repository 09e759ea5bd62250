//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核命令行参数解析模块
//!
//! ```text
//! osim-kernel [code_path size] [config=PATH]
//! ```
//! - 位置参数：初始进程的代码路径和大小，必须成对出现
//! - `key=value` 参数：目前只有 `config`

use std::path::PathBuf;

use crate::error::{KernelError, KernelResult};

/// 默认配置文件
pub const DEFAULT_CONFIG: &str = "config/kernel.toml";

/// 默认初始进程
pub const DEFAULT_PROGRAM: &str = "helloworld";
pub const DEFAULT_SIZE: usize = 1024;

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmdline {
    pub program: String,
    pub size: usize,
    pub config: PathBuf,
}

/// 解析命令行参数（不含程序名）
pub fn parse<I, S>(args: I) -> KernelResult<Cmdline>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tokens: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
    let config = get_param(&tokens, "config").unwrap_or(DEFAULT_CONFIG);

    let positional: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !t.contains('='))
        .collect();
    let (program, size) = match positional.as_slice() {
        [] => (DEFAULT_PROGRAM.to_string(), DEFAULT_SIZE),
        [_] => {
            return Err(KernelError::Config(
                "missing process size: osim-kernel [code_path size] [config=PATH]".to_string(),
            ))
        }
        [path, size, ..] => {
            let size = size
                .parse()
                .map_err(|_| KernelError::Config(format!("invalid process size {:?}", size)))?;
            (path.to_string(), size)
        }
    };

    Ok(Cmdline {
        program,
        size,
        config: PathBuf::from(config),
    })
}

/// 获取指定键的值
///
/// `config=/etc/kernel.toml` -> `get_param(tokens, "config") == Some("/etc/kernel.toml")`
pub fn get_param<'a>(tokens: &'a [String], key: &str) -> Option<&'a str> {
    tokens.iter().find_map(|token| {
        let (k, v) = token.split_once('=')?;
        (k == key).then_some(v)
    })
}

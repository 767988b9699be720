// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP/1.1 服务端
//!
//! 启动流程：
//! - 初始化 log4rs 日志系统（读取 `config/log4rs.yaml`）
//! - 读取 TOML 配置，命令行中的端口与文档根目录优先于配置文件
//! - 按配置的工作线程数构建 Tokio 运行时并进入接受循环，直到收到 Ctrl-C

use std::process;

use clap::Parser;
use log::{error, info, LevelFilter};
use log4rs::append::console::Target;
use tokio::runtime::Builder;

use httpwire::{config::Config, logging, server};

#[derive(Parser)]
#[command(name = "httpwire-server")]
#[command(about = "Socket-level HTTP/1.1 server with static files, redirects and form echo", long_about = None)]
struct Cli {
    /// 监听端口（1-65535）
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// 文档根目录
    document_root: Option<String>,

    /// 配置文件路径
    #[arg(short, long, default_value = "config/development.toml")]
    config: String,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    logging::init("config/log4rs.yaml", Target::Stdout, LevelFilter::Info);

    let mut config = match Config::from_toml(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("无法读取配置文件{}：{}", cli.config, e);
            process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.set_port(port);
    }
    if let Some(root) = &cli.document_root {
        config.set_www_root(root);
    }
    info!("配置文件已载入");

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(server::run(&config)) {
        error!("服务端异常退出：{}", e);
        process::exit(1);
    }
    info!("服务端已停止");
}

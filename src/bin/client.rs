// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP/1.1 命令行客户端
//!
//! 发起一次 GET 请求，按需跟随重定向，打印响应报告，并可把正文保存到文件。
//! 请求失败、参数错误或被 Ctrl-C 中断时以状态码 1 退出，其余情况为 0。

use std::process;

use chrono::Local;
use clap::{CommandFactory, Parser};
use log::{error, LevelFilter};
use log4rs::append::console::Target;

use httpwire::{
    client,
    config::Config,
    logging,
    redirect::{FollowState, RedirectFollower},
};

#[derive(Parser)]
#[command(name = "httpwire-client")]
#[command(about = "Socket-level HTTP/1.1 client with redirect tracing", long_about = None)]
struct Cli {
    /// 请求的 URL，省略协议时默认为 http://
    url: Option<String>,

    /// 把响应正文保存到文件；没有扩展名时自动追加时间戳与 .html
    #[arg(long, value_name = "FILE")]
    save: Option<String>,

    /// 只显示重要的响应头
    #[arg(long)]
    no_headers: bool,

    /// 不跟随 3xx 重定向
    #[arg(long)]
    no_redirect: bool,

    /// 配置文件路径
    #[arg(short, long, default_value = "config/development.toml")]
    config: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };
    let url = match &cli.url {
        Some(u) => u.clone(),
        None => {
            let _ = Cli::command().print_help();
            return;
        }
    };

    logging::init("config/log4rs-client.yaml", Target::Stderr, LevelFilter::Warn);

    let config = match Config::from_toml(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("无法读取配置文件{}：{}", cli.config, e);
            process::exit(1);
        }
    };

    println!("[INFO] Starting httpwire client");
    let follower = RedirectFollower::new(config.client()).follow_redirects(!cli.no_redirect);

    // 被中断时 fetch 的 future 随 select! 一起被丢弃，其中打开的连接随之关闭
    let result = tokio::select! {
        r = follower.fetch(&url) => Some(r),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match result {
        None => {
            println!("\n[INFO] Interrupted by user");
            process::exit(1);
        }
        Some(Err(e)) => {
            error!("请求{}失败：{}", url, e);
            println!("\n[FAILED] HTTP request failed: {}", e);
            process::exit(1);
        }
        Some(Ok(o)) => o,
    };

    if let Some(trace) = client::render_trace(&outcome.trace) {
        print!("{}", trace);
    }
    print!("{}", client::render_response(&outcome.response, !cli.no_headers));

    if let Some(name) = &cli.save {
        let path = client::save_path(name, &Local::now());
        match client::save_body(&path, outcome.response.body()) {
            Ok(size) => println!("[SUCCESS] Content saved: {} ({} bytes)", path.display(), size),
            Err(e) => println!("[ERROR] Cannot save {}: {}", path.display(), e),
        }
    }

    if outcome.state == FollowState::Failed {
        println!(
            "\n[WARNING] Maximum redirects reached, showing the last response from {}",
            outcome.final_url
        );
    }
    match outcome.response.status_code() {
        Some(code) if (200..300).contains(&code) => println!("\n[SUCCESS] HTTP request successful!"),
        Some(code) => println!("\n[WARNING] HTTP request completed with status code {}", code),
        None => {}
    }
}

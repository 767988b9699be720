// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务端主循环
//!
//! 一个接受循环，每条连接交给一个独立的 Tokio 任务处理。任务之间不共享可变状态，
//! 唯一的共享写入点是访问日志。接受循环不等待任务结束，也不限制任务数量。

use std::{
    collections::HashMap,
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::Path,
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::{
    access_log::AccessLog,
    config::Config,
    connection::Connection,
    dispatcher::{self, Dispatch, ServerContext},
    exception::Exception,
};

/// 按配置绑定监听端口：`local` 为真时只监听回环地址。
pub async fn bind(config: &Config) -> io::Result<TcpListener> {
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, config.port());
    info!("服务端将在{}上监听Socket连接", socket);
    TcpListener::bind(socket).await
}

/// 按配置启动服务端，直到收到 Ctrl-C。
pub async fn run(config: &Config) -> io::Result<()> {
    let ctx = Arc::new(ServerContext::from_config(config)?);
    info!("www root: {}", ctx.document_root().display());
    let access_log = Arc::new(AccessLog::new(Path::new(config.access_log())));
    let listener = bind(config).await?;
    info!("端口{}绑定完成", config.port());

    serve(listener, ctx, access_log, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听Ctrl-C信号：{}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;
    Ok(())
}

/// 同步的分发函数：原始请求字节 → 响应与访问日志描述。
pub type DispatchFn = fn(&[u8], &ServerContext, u128) -> Dispatch;

/// 接受循环。`shutdown` 完成后停止接受新连接并返回，已派发的任务继续运行到结束。
pub async fn serve<F>(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    access_log: Arc<AccessLog>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    serve_with(listener, ctx, access_log, shutdown, dispatcher::dispatch).await
}

/// 与 [`serve`] 相同，但使用指定的分发函数。
pub async fn serve_with<F>(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    access_log: Arc<AccessLog>,
    shutdown: F,
    handler: DispatchFn,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut id: u128 = 0;
    loop {
        let (stream, addr) = tokio::select! {
            _ = &mut shutdown => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(a) => a,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let ctx = Arc::clone(&ctx);
        let access_log = Arc::clone(&access_log);
        tokio::spawn(async move {
            handle_connection(stream, addr, id, ctx, access_log, handler).await;
        });
        id += 1;
    }
}

/// 处理单条连接：读取请求、分发、发送响应、记录访问日志、关闭连接。
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: u128,
    ctx: Arc<ServerContext>,
    access_log: Arc<AccessLog>,
    handler: DispatchFn,
) {
    let mut connection = Connection::from_stream(stream, addr, ctx.timeout());
    let raw = match connection
        .receive_request(ctx.buffer_size(), ctx.max_request_size())
        .await
    {
        Ok(raw) if raw.is_empty() => {
            debug!("[ID{}]客户端没有发送任何数据", id);
            connection.close().await;
            return;
        }
        Ok(raw) => raw,
        Err(e) => {
            warn!("[ID{}]读取请求失败：{}", id, e);
            let request_line = match e {
                Exception::PayloadTooLarge => "OVERSIZED",
                _ => "INCOMPLETE",
            };
            let dispatched = Dispatch {
                response: dispatcher::error_response(e, &ctx, ""),
                request_line: request_line.to_string(),
            };
            finish(connection, addr, id, dispatched, access_log).await;
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕，共{}字节", id, raw.len());
    let start_time = Instant::now();

    // 分发在阻塞线程池中执行，其中的 panic 会以 JoinError 的形式返回
    let dispatched = {
        let ctx = Arc::clone(&ctx);
        tokio::task::spawn_blocking(move || handler(&raw, &ctx, id)).await
    };
    let dispatched = match dispatched {
        Ok(d) => d,
        Err(e) => {
            error!("[ID{}]处理请求时发生未知异常：{}", id, e);
            Dispatch {
                response: dispatcher::error_response(Exception::InternalFailure, &ctx, ""),
                request_line: "ERROR".to_string(),
            }
        }
    };
    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    finish(connection, addr, id, dispatched, access_log).await;
}

// 发送响应，写访问日志，最后关闭连接
async fn finish(
    mut connection: Connection,
    addr: SocketAddr,
    id: u128,
    dispatched: Dispatch,
    access_log: Arc<AccessLog>,
) {
    let Dispatch {
        response,
        request_line,
    } = dispatched;
    match connection.send(&response.as_bytes()).await {
        Ok(n) => debug!("[ID{}]已发送{}字节", id, n),
        Err(e) => error!("[ID{}]发送响应失败：{}", id, e),
    }
    info!(
        "[ID{}] {}, {}, {}",
        id,
        request_line,
        response.status_code(),
        response.information()
    );

    // 文件写入在阻塞线程池中完成，不占用异步工作线程
    let status_code = response.status_code();
    let bytes = response.content_length();
    let client_ip = addr.ip().to_string();
    let written = tokio::task::spawn_blocking(move || {
        access_log.record(&client_ip, &request_line, status_code, bytes)
    })
    .await;
    if let Err(e) = written {
        error!("[ID{}]写入访问日志的任务异常结束：{}", id, e);
    }
    connection.close().await;
}

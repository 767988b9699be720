// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接交换模块
//!
//! 一个 `Connection` 只承载一次“请求 - 响应”交换：
//! 连接（带超时） → 发送 → 接收直到对端关闭或读超时 → 关闭。
//!
//! 由于所有报文都带 `Connection: close` 且不存在分块编码，流结束即报文结束，
//! 客户端的接收循环因此不参考 `Content-Length`。这个假设被隔离在 [`Connection::receive_all`]
//! 内部，将来换成按长度/分块读取时调用方无需改动。

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{lookup_host, TcpStream},
    time::timeout,
};

use crate::{
    codec::{self, HttpMessage, OutboundRequest},
    exception::Exception,
    resolver::ParsedUrl,
};

/// 单次交换所使用的 TCP 连接。
pub struct Connection {
    stream: Option<TcpStream>,
    peer: String,
    timeout: Duration,
}

impl Connection {
    /// 解析主机名并建立连接，DNS 与每次连接尝试都受 `timeout` 限制。
    pub async fn open(host: &str, port: u16, timeout_duration: Duration) -> Result<Self, Exception> {
        let addrs: Vec<SocketAddr> = match timeout(timeout_duration, lookup_host((host, port))).await {
            Err(_) => {
                error!("解析主机{}超时", host);
                return Err(Exception::Timeout);
            }
            Ok(Err(e)) => {
                error!("无法解析主机{}：{}", host, e);
                return Err(Exception::DnsFailure);
            }
            Ok(Ok(iter)) => iter.collect(),
        };
        if addrs.is_empty() {
            error!("主机{}没有可用的地址", host);
            return Err(Exception::DnsFailure);
        }

        for addr in &addrs {
            debug!("尝试连接{}（{}）", host, addr);
            match timeout(timeout_duration, TcpStream::connect(addr)).await {
                Err(_) => {
                    error!("连接{}超时", addr);
                    return Err(Exception::Timeout);
                }
                Ok(Err(e)) => {
                    warn!("连接{}失败：{}", addr, e);
                }
                Ok(Ok(stream)) => {
                    debug!("已连接到{}", addr);
                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr.to_string(),
                        timeout: timeout_duration,
                    });
                }
            }
        }
        error!("无法连接到{}:{}", host, port);
        Err(Exception::ConnectFailure)
    }

    /// 包装服务端 accept 得到的连接。
    pub fn from_stream(stream: TcpStream, peer: SocketAddr, timeout_duration: Duration) -> Self {
        Self {
            stream: Some(stream),
            peer: peer.to_string(),
            timeout: timeout_duration,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// 写出全部字节并刷新，返回写出的字节数。
    pub async fn send(&mut self, bytes: &[u8]) -> Result<usize, Exception> {
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Err(Exception::SendFailure),
        };
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout(self.timeout, write).await {
            Err(_) => {
                error!("向{}发送数据超时", self.peer);
                Err(Exception::Timeout)
            }
            Ok(Err(e)) => {
                error!("向{}发送数据失败：{}", self.peer, e);
                Err(Exception::SendFailure)
            }
            Ok(Ok(())) => Ok(bytes.len()),
        }
    }

    /// 反复读取直到对端关闭连接或某次读取超时，返回累计收到的全部字节。
    ///
    /// 超时前一个字节都没有收到时返回 `Timeout`；已收到部分数据时照常返回这些数据。
    pub async fn receive_all(&mut self, buffer_size: usize) -> Result<Vec<u8>, Exception> {
        let mut received = Vec::new();
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Ok(received),
        };
        let mut buffer = vec![0u8; buffer_size.max(1)];
        loop {
            match timeout(self.timeout, stream.read(&mut buffer)).await {
                Err(_) if received.is_empty() => {
                    error!("等待{}的响应超时", self.peer);
                    return Err(Exception::Timeout);
                }
                Err(_) => {
                    debug!("读取{}超时，已接收{}字节", self.peer, received.len());
                    break;
                }
                Ok(Err(e)) => {
                    warn!("读取{}时出错：{}", self.peer, e);
                    break;
                }
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => received.extend_from_slice(&buffer[..n]),
            }
        }
        Ok(received)
    }

    /// 服务端读取一条请求：读到头部分界后，再按 `Content-Length` 补齐请求体。
    ///
    /// - 对端关闭，或一个字节都没收到就超时：返回已收到的字节（可能为空）。
    /// - 收到部分请求后超时：`RequestTimeout`。
    /// - 已收字节或请求头声明的总长度超过 `max_size`：`PayloadTooLarge`，不再继续读取。
    pub async fn receive_request(
        &mut self,
        buffer_size: usize,
        max_size: usize,
    ) -> Result<Vec<u8>, Exception> {
        let mut received = Vec::new();
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Ok(received),
        };
        let mut buffer = vec![0u8; buffer_size.max(1)];
        loop {
            match timeout(self.timeout, stream.read(&mut buffer)).await {
                Err(_) if received.is_empty() => {
                    debug!("{}在超时前没有发送任何数据", self.peer);
                    break;
                }
                Err(_) => {
                    warn!("读取{}的请求超时，已接收{}字节", self.peer, received.len());
                    return Err(Exception::RequestTimeout);
                }
                Ok(Err(e)) => {
                    warn!("读取{}的请求时出错：{}", self.peer, e);
                    break;
                }
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => received.extend_from_slice(&buffer[..n]),
            }
            match expected_length(&received) {
                Some(total) if total > max_size => {
                    warn!("{}的请求声明长度{}超过{}字节的上限", self.peer, total, max_size);
                    return Err(Exception::PayloadTooLarge);
                }
                Some(total) if received.len() >= total => break,
                _ if received.len() >= max_size => {
                    warn!("{}的请求超过{}字节，停止读取", self.peer, max_size);
                    return Err(Exception::PayloadTooLarge);
                }
                _ => {}
            }
        }
        Ok(received)
    }

    /// 关闭连接。可重复调用，失败只记录日志。
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("关闭与{}的连接时出错（忽略）：{}", self.peer, e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

/// 头部完整时，按 `Content-Length` 计算整条请求应有的字节数；头部尚未结束时为 `None`。
fn expected_length(received: &[u8]) -> Option<usize> {
    let boundary = codec::find_boundary(received)?;
    let body_start = boundary + crate::param::HEADER_BOUNDARY.len();
    let head = codec::decode_text(&received[..boundary]);
    let content_length = head
        .split(crate::param::CRLF)
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .filter_map(|(_, value)| value.trim().parse::<usize>().ok())
        .last()
        .unwrap_or(0);
    Some(body_start.saturating_add(content_length))
}

/// 完成一次完整交换：连接、发送、接收、解析。
///
/// 无论成功、超时还是出错，连接都会在返回前关闭。
pub async fn exchange(
    url: &ParsedUrl,
    request: &OutboundRequest,
    timeout_duration: Duration,
    buffer_size: usize,
) -> Result<HttpMessage, Exception> {
    let mut connection = Connection::open(url.host(), url.port(), timeout_duration).await?;
    let result = async {
        let sent = connection.send(&request.to_bytes()).await?;
        debug!("已向{}发送{}字节", connection.peer(), sent);
        let raw = connection.receive_all(buffer_size).await?;
        debug!("从{}接收到{}字节", connection.peer(), raw.len());
        codec::parse_response(&raw)
    }
    .await;
    connection.close().await;
    result
}

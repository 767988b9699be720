// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了客户端与服务端在一次报文交换（Exchange）中可能遇到的各类失败情况。
//!
//! ## 设计意图
//! - **客户端侧**：URL 解析、DNS、连接、发送、超时与报文解析失败。
//! - **服务端侧**：每个变体一一对应一个 HTTP 状态码（400/403/404/405/408/413/500），
//!   由分发器转换为对应的错误响应。
//! - 可以宽松处理的歧义（缺少分界行、日期无法解析、表单格式错误等）不会产生 `Exception`。

use std::fmt;

/// 报文交换过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// URL 缺少主机名，或使用了 http/https 以外的协议。
    InvalidUrl,
    /// 主机名无法解析为任何地址。
    DnsFailure,
    /// 所有解析到的地址都拒绝了连接。
    ConnectFailure,
    /// DNS、连接或发送在限定时间内没有完成。
    Timeout,
    /// 请求字节未能写入套接字。
    SendFailure,
    /// 响应的状态行缺失或状态码不是整数。
    MalformedMessage,
    /// 没有收到任何可以解码的字节。
    DecodeFailure,
    /// 请求行不是 `方法 目标 版本` 三段式。对应 `400 Bad Request`。
    MalformedRequest,
    /// 请求路径越出了文档根目录。对应 `403 Forbidden`。
    ForbiddenPath,
    /// 请求的资源不存在。对应 `404 Not Found`。
    NotFound,
    /// 服务端只接受 GET 与 POST。对应 `405 Method Not Allowed`。
    MethodNotAllowed,
    /// 收到部分请求后读超时。对应 `408 Request Timeout`。
    RequestTimeout,
    /// 请求总长度超过上限。对应 `413 Content Too Large`。
    PayloadTooLarge,
    /// 处理请求时出现了意外错误。对应 `500 Internal Server Error`。
    InternalFailure,
}

use Exception::*;

impl Exception {
    /// 服务端异常对应的 HTTP 状态码；客户端异常返回 `None`。
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MalformedRequest => Some(400),
            ForbiddenPath => Some(403),
            NotFound => Some(404),
            MethodNotAllowed => Some(405),
            RequestTimeout => Some(408),
            PayloadTooLarge => Some(413),
            InternalFailure => Some(500),
            _ => None,
        }
    }
}

impl fmt::Display for Exception {
    /// 写入人类可读的描述文本，用于日志与命令行输出。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidUrl => write!(f, "Invalid URL"),
            DnsFailure => write!(f, "Could not resolve host"),
            ConnectFailure => write!(f, "Could not connect to host"),
            Timeout => write!(f, "Operation timed out"),
            SendFailure => write!(f, "Failed to send request"),
            MalformedMessage => write!(f, "Malformed HTTP message"),
            DecodeFailure => write!(f, "Received bytes could not be decoded"),
            MalformedRequest => write!(f, "Malformed request (400)"),
            ForbiddenPath => write!(f, "Forbidden path (403)"),
            NotFound => write!(f, "File not found (404)"),
            MethodNotAllowed => write!(f, "Method not allowed (405)"),
            RequestTimeout => write!(f, "Request timed out (408)"),
            PayloadTooLarge => write!(f, "Request too large (413)"),
            InternalFailure => write!(f, "Internal server error (500)"),
        }
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_status_mapping() {
        assert_eq!(MalformedRequest.status_code(), Some(400));
        assert_eq!(ForbiddenPath.status_code(), Some(403));
        assert_eq!(NotFound.status_code(), Some(404));
        assert_eq!(MethodNotAllowed.status_code(), Some(405));
        assert_eq!(RequestTimeout.status_code(), Some(408));
        assert_eq!(PayloadTooLarge.status_code(), Some(413));
        assert_eq!(InternalFailure.status_code(), Some(500));
    }

    #[test]
    fn test_client_errors_have_no_status() {
        for e in [InvalidUrl, DnsFailure, ConnectFailure, Timeout, SendFailure] {
            assert_eq!(e.status_code(), None);
        }
    }
}

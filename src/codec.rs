// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 报文编解码模块
//!
//! 该模块是客户端与服务端共用的核心组件，负责：
//! 1. 把请求行与有序请求头编码为线上字节（`OutboundRequest`）。
//! 2. 把接收到的原始字节解析为结构化的 `HttpMessage`，请求与响应共用同一结构。
//!
//! 解析遵循“能宽松就宽松”的原则：找不到头部分界行、头部行缺少冒号、
//! 字节不是合法 UTF-8，都不会导致失败；只有状态码、请求行三段式这类结构性字段缺失时才报错。

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use log::debug;

use crate::{exception::Exception, param::*, resolver::ParsedUrl};

/// 待发送的请求。
///
/// 头部名称在查找时大小写不敏感，在编码时保留调用者给出的大小写与顺序。
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: HttpRequestMethod,
    target: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl OutboundRequest {
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// 构造一个带齐所有必需请求头的 GET 请求。
    pub fn get(url: &ParsedUrl, user_agent: &str) -> Self {
        Self::new(HttpRequestMethod::Get, &url.target())
            .header("Host", &url.authority())
            .header("User-Agent", user_agent)
            .header("Accept", DEFAULT_ACCEPT)
            .header("Accept-Language", DEFAULT_ACCEPT_LANGUAGE)
            .header("Accept-Encoding", "identity")
            .header("Connection", "close")
            .header("Cache-Control", "no-cache")
    }

    /// 设置请求头；同名（忽略大小写）的头已存在时原位替换。
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => *entry = (name.to_string(), value.to_string()),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    /// 附加请求体，并同步设置 `Content-Length`。
    pub fn with_body(self, body: Bytes) -> Self {
        let length = body.len().to_string();
        let mut request = self.header("Content-Length", &length);
        request.body = Some(body);
        request
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn method(&self) -> &HttpRequestMethod {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 编码为线上字节：请求行 + 头部块 + 空行 + 请求体。
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = [
            build_request_line(&self.method, &self.target),
            build_header_block(&self.headers),
            CRLF.to_string(),
        ]
        .concat();
        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}

/// 构造请求行，例如 `GET /index.html HTTP/1.1\r\n`。
pub fn build_request_line(method: &HttpRequestMethod, target: &str) -> String {
    format!("{} {} {}{}", method, target, HttpVersion::V1_1, CRLF)
}

/// 把有序的头部列表编码为 `名称: 取值\r\n` 序列（不含结尾空行）。
pub fn build_header_block(headers: &[(String, String)]) -> String {
    let mut block = String::new();
    for (name, value) in headers {
        block.push_str(name);
        block.push_str(": ");
        block.push_str(value);
        block.push_str(CRLF);
    }
    block
}

/// 起始行：请求报文为请求行，响应报文为状态行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: String,
    },
    Status {
        version: String,
        status_code: u16,
        reason: String,
    },
}

/// 解析后的 HTTP 报文，构造后不可变。
#[derive(Debug, Clone)]
pub struct HttpMessage {
    start_line: StartLine,
    /// 小写头部名 -> 取值，重复出现时以最后一次为准
    headers: HashMap<String, String>,
    body: Bytes,
    raw_length: usize,
}

impl HttpMessage {
    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    /// 按名称查找头部，大小写不敏感。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 正文的文本形式（UTF-8 失败时按 Latin-1 解码）。
    pub fn body_text(&self) -> Cow<'_, str> {
        decode_text(&self.body)
    }

    /// 实际接收到的字节数
    pub fn raw_length(&self) -> usize {
        self.raw_length
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.start_line {
            StartLine::Status { status_code, .. } => Some(*status_code),
            StartLine::Request { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Status { reason, .. } => Some(reason),
            StartLine::Request { .. } => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Status { .. } => None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { target, .. } => Some(target),
            StartLine::Status { .. } => None,
        }
    }

    pub fn version(&self) -> &str {
        match &self.start_line {
            StartLine::Request { version, .. } | StartLine::Status { version, .. } => version,
        }
    }

    /// `Content-Length` 头的数值；缺失或无法解析时为 `None`。
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
    }
}

/// 查找第一个 `CRLF CRLF` 分界的位置（分界本身的起始偏移）。
pub fn find_boundary(raw: &[u8]) -> Option<usize> {
    raw.windows(HEADER_BOUNDARY.len())
        .position(|w| w == HEADER_BOUNDARY)
}

/// 把报文切分为头部块与正文。
///
/// 找不到分界时整个负载都被视为头部，正文为空。
pub fn split_message(raw: &[u8]) -> (&[u8], &[u8]) {
    match find_boundary(raw) {
        Some(idx) => (&raw[..idx], &raw[idx + HEADER_BOUNDARY.len()..]),
        None => (raw, &[]),
    }
}

/// 字节解码：优先 UTF-8，失败时退回 Latin-1。
///
/// Latin-1 把每个字节映射为同值的码位，因此任何字节序列都能得到结果。
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            debug!("报文不是合法的UTF-8，使用Latin-1解码");
            Cow::Owned(bytes.iter().map(|&b| b as char).collect())
        }
    }
}

/// 解析响应报文。
///
/// # 错误处理
/// - 负载为空时返回 `DecodeFailure`。
/// - 状态行不足两段或状态码不是整数时返回 `MalformedMessage`。
pub fn parse_response(raw: &[u8]) -> Result<HttpMessage, Exception> {
    if raw.is_empty() {
        return Err(Exception::DecodeFailure);
    }
    let (head, body) = split_message(raw);
    let head_text = decode_text(head);
    let mut lines = head_text.split(CRLF);

    // 状态行，例如 "HTTP/1.1 404 Not Found"，原因短语本身可以包含空格
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default().to_string();
    let status_code = parts
        .next()
        .and_then(|code| code.trim().parse::<u16>().ok())
        .ok_or(Exception::MalformedMessage)?;
    let reason = parts.next().unwrap_or_default().trim_end().to_string();

    Ok(HttpMessage {
        start_line: StartLine::Status {
            version,
            status_code,
            reason,
        },
        headers: parse_header_lines(lines),
        body: Bytes::copy_from_slice(body),
        raw_length: raw.len(),
    })
}

/// 解析请求报文。
///
/// 请求行必须是 `方法 目标 版本` 三段，且版本以 `HTTP/` 开头，否则返回 `MalformedRequest`。
/// 方法名统一转为大写，请求目标保持原样（不做百分号解码）。
pub fn parse_request(raw: &[u8]) -> Result<HttpMessage, Exception> {
    if raw.is_empty() {
        return Err(Exception::MalformedRequest);
    }
    let (head, body) = split_message(raw);
    let head_text = decode_text(head);
    let mut lines = head_text.split(CRLF);

    let request_line = lines.next().unwrap_or_default().trim();
    let parts: Vec<&str> = request_line.splitn(3, ' ').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(Exception::MalformedRequest);
    }
    if !parts[2].to_ascii_uppercase().starts_with("HTTP/") {
        return Err(Exception::MalformedRequest);
    }

    Ok(HttpMessage {
        start_line: StartLine::Request {
            method: parts[0].to_ascii_uppercase(),
            target: parts[1].to_string(),
            version: parts[2].to_string(),
        },
        headers: parse_header_lines(lines),
        body: Bytes::copy_from_slice(body),
        raw_length: raw.len(),
    })
}

/// 逐行解析头部：在第一个 `:` 处切分，名称转小写并去除空白，取值去除空白。
/// 不含 `:` 的行被忽略。
fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use proptest::prelude::*;

    #[test]
    fn test_build_request_line() {
        assert_eq!(
            build_request_line(&HttpRequestMethod::Get, "/index.html?a=1"),
            "GET /index.html?a=1 HTTP/1.1\r\n"
        );
    }

    #[test]
    fn test_build_header_block_preserves_order_and_case() {
        let headers = vec![
            ("Host".to_string(), "example.com".to_string()),
            ("X-Custom-ID".to_string(), "7".to_string()),
        ];
        assert_eq!(
            build_header_block(&headers),
            "Host: example.com\r\nX-Custom-ID: 7\r\n"
        );
    }

    #[test]
    fn test_get_request_carries_required_headers() {
        let url = resolve("example.com:8080/page?q=1").unwrap();
        let request = OutboundRequest::get(&url, USER_AGENT);
        let wire = String::from_utf8(request.to_bytes()).unwrap();

        assert!(wire.starts_with("GET /page?q=1 HTTP/1.1\r\n"));
        assert!(wire.contains("Host: example.com:8080\r\n"));
        assert!(wire.contains(&format!("User-Agent: {}\r\n", USER_AGENT)));
        assert!(wire.contains("Accept: "));
        assert!(wire.contains("Accept-Language: "));
        assert!(wire.contains("Accept-Encoding: identity\r\n"));
        assert!(wire.contains("Connection: close\r\n"));
        assert!(wire.contains("Cache-Control: no-cache\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let url = resolve("example.com").unwrap();
        let request = OutboundRequest::get(&url, USER_AGENT).header("user-agent", "other/1.0");
        assert_eq!(request.get_header("USER-AGENT"), Some("other/1.0"));
        // 原位替换，不会产生重复头
        assert_eq!(
            request
                .headers()
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case("user-agent"))
                .count(),
            1
        );
        assert_eq!(request.headers()[1].0, "user-agent");
    }

    #[test]
    fn test_post_body_sets_content_length() {
        let request = OutboundRequest::new(HttpRequestMethod::Post, "/submit")
            .header("Host", "localhost")
            .with_body(Bytes::from_static(b"name=Ann"));
        let wire = String::from_utf8(request.to_bytes()).unwrap();
        assert!(wire.contains("Content-Length: 8\r\n"));
        assert!(wire.ends_with("\r\n\r\nname=Ann"));
    }

    #[test]
    fn test_parse_response_basic() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 5\r\n\r\nhello";
        let message = parse_response(raw).unwrap();
        assert_eq!(message.status_code(), Some(200));
        assert_eq!(message.reason(), Some("OK"));
        assert_eq!(message.version(), "HTTP/1.1");
        assert_eq!(message.header("Content-Type"), Some("text/html"));
        assert_eq!(message.content_length(), Some(5));
        assert_eq!(message.body().as_ref(), b"hello");
        assert_eq!(message.raw_length(), raw.len());
    }

    #[test]
    fn test_parse_response_reason_with_spaces() {
        let message = parse_response(b"HTTP/1.1 404 Not Found Here\r\n\r\n").unwrap();
        assert_eq!(message.status_code(), Some(404));
        assert_eq!(message.reason(), Some("Not Found Here"));
    }

    #[test]
    fn test_parse_response_non_integer_status() {
        let result = parse_response(b"HTTP/1.1 abc OK\r\n\r\n");
        assert_eq!(result.unwrap_err(), Exception::MalformedMessage);
        let result = parse_response(b"garbage\r\n\r\n");
        assert_eq!(result.unwrap_err(), Exception::MalformedMessage);
    }

    #[test]
    fn test_parse_response_empty_payload() {
        assert_eq!(parse_response(b"").unwrap_err(), Exception::DecodeFailure);
    }

    #[test]
    fn test_parse_response_without_boundary() {
        let message = parse_response(b"HTTP/1.1 301 Moved Permanently\r\nLocation: /next").unwrap();
        assert_eq!(message.status_code(), Some(301));
        assert_eq!(message.header("location"), Some("/next"));
        assert!(message.body().is_empty());
    }

    #[test]
    fn test_parse_headers_last_wins_and_ignores_junk() {
        let raw = b"HTTP/1.1 200 OK\r\nX-A: 1\r\nno colon here\r\n  X-a :  2  \r\n\r\n";
        let message = parse_response(raw).unwrap();
        assert_eq!(message.header("x-a"), Some("2"));
        assert_eq!(message.headers().len(), 1);
    }

    #[test]
    fn test_header_value_may_contain_colon() {
        let raw = b"HTTP/1.1 302 Found\r\nLocation: http://example.com:8080/x\r\n\r\n";
        let message = parse_response(raw).unwrap();
        assert_eq!(message.header("location"), Some("http://example.com:8080/x"));
    }

    #[test]
    fn test_only_first_boundary_splits() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nline1\r\n\r\nline2";
        let message = parse_response(raw).unwrap();
        assert_eq!(message.body().as_ref(), b"line1\r\n\r\nline2");
    }

    #[test]
    fn test_latin1_fallback() {
        let mut raw = b"HTTP/1.1 200 OK\r\nX-Name: caf".to_vec();
        raw.push(0xE9);
        raw.extend_from_slice(b"\r\n\r\n");
        raw.push(0xFF);
        let message = parse_response(&raw).unwrap();
        assert_eq!(message.header("x-name"), Some("café"));
        assert_eq!(message.body().as_ref(), &[0xFF]);
        assert_eq!(message.body_text(), "ÿ");
    }

    #[test]
    fn test_parse_request() {
        let raw = b"post /submit?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nname=Ann&age=5";
        let message = parse_request(raw).unwrap();
        assert_eq!(message.method(), Some("POST"));
        assert_eq!(message.target(), Some("/submit?x=1"));
        assert_eq!(message.version(), "HTTP/1.1");
        assert_eq!(message.header("host"), Some("localhost"));
        assert_eq!(message.body().as_ref(), b"name=Ann&age=5");
        assert_eq!(message.status_code(), None);
    }

    #[test]
    fn test_parse_request_malformed() {
        for raw in [
            &b""[..],
            b"GET\r\n\r\n",
            b"GET /\r\n\r\n",
            b"GET / SPDY/3\r\n\r\n",
            b"\r\n\r\n",
        ] {
            assert_eq!(parse_request(raw).unwrap_err(), Exception::MalformedRequest);
        }
    }

    #[test]
    fn test_parse_request_without_boundary() {
        let message = parse_request(b"GET /index.html HTTP/1.1\r\nHost: x").unwrap();
        assert_eq!(message.target(), Some("/index.html"));
        assert_eq!(message.header("host"), Some("x"));
        assert!(message.body().is_empty());
    }

    proptest! {
        #[test]
        fn prop_split_at_first_boundary(
            header_value in "[a-zA-Z0-9 ]{0,20}",
            body in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            let mut raw = format!("HTTP/1.1 200 OK\r\nX-Test: {}", header_value).into_bytes();
            let offset = raw.len() + HEADER_BOUNDARY.len();
            raw.extend_from_slice(HEADER_BOUNDARY);
            raw.extend_from_slice(&body);

            let message = parse_response(&raw).unwrap();
            prop_assert_eq!(message.body().as_ref(), &raw[offset..]);
            prop_assert_eq!(message.header("x-test"), Some(header_value.trim()));
        }
    }
}

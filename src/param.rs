// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义了客户端与服务端共用的 HTTP/1.1 协议常量，包括：
//! - 报文分隔符、默认请求头取值、服务器与客户端标识。
//! - 常见状态码的原因短语（Reason Phrase）。
//! - 扩展名到 MIME 类型的兜底映射表，以及从系统 MIME 数据库加载的映射。
//! - HTTP 方法与版本的强类型枚举。

use std::collections::HashMap;
use std::fmt;
use std::fs;

use lazy_static::lazy_static;
use log::debug;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "httpwire-server/0.1";

/// 客户端标识，用于请求头的 `User-Agent` 字段
pub const USER_AGENT: &str = "httpwire-client/0.1";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 头部与正文之间的分界（空行）
pub const HEADER_BOUNDARY: &[u8] = b"\r\n\r\n";

/// 客户端默认的 `Accept` 取值
pub const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// 客户端默认的 `Accept-Language` 取值
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// 表单提交使用的媒体类型
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// 目录请求时优先返回的首页文件名
pub const INDEX_FILE: &str = "index.html";

/// 自定义错误页所在的子目录（相对于文档根目录）
pub const ERROR_PAGE_DIR: &str = "errors";

/// 兜底的二进制类型
pub const OCTET_STREAM: &str = "application/octet-stream";

/// 系统 MIME 数据库的位置（Debian/Fedora 等发行版均提供）
pub const SYSTEM_MIME_DATABASE: &str = "/etc/mime.types";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(204, "No Content");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(413, "Content Too Large");
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map
    };
}

lazy_static! {
    /// 文件扩展名到 MIME 类型的兜底映射表。
    ///
    /// 仅在系统 MIME 数据库中查不到时使用，键为不带点号的小写扩展名。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("html", "text/html; charset=utf-8");
        map.insert("htm", "text/html; charset=utf-8");
        map.insert("css", "text/css");
        map.insert("js", "application/javascript");
        map.insert("json", "application/json");
        map.insert("txt", "text/plain; charset=utf-8");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("gif", "image/gif");
        map.insert("svg", "image/svg+xml");
        map.insert("ico", "image/x-icon");
        map.insert("pdf", "application/pdf");
        map.insert("zip", "application/zip");
        map.insert("tar", "application/x-tar");
        map.insert("gz", "application/gzip");
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("avi", "video/x-msvideo");
        map.insert("csv", "text/csv");
        map.insert("xml", "application/xml");
        map.insert("doc", "application/msword");
        map.insert(
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        );
        map.insert("xls", "application/vnd.ms-excel");
        map.insert(
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        );
        map
    };
}

lazy_static! {
    /// 从系统 MIME 数据库（`/etc/mime.types`）加载的扩展名映射。
    ///
    /// 文件不存在时得到空表，此时所有查询都会落到 [`MIME_TYPES`]。
    pub static ref SYSTEM_MIME_TYPES: HashMap<String, String> = {
        match fs::read_to_string(SYSTEM_MIME_DATABASE) {
            Ok(text) => parse_mime_database(&text),
            Err(e) => {
                debug!("无法读取系统MIME数据库{}：{}", SYSTEM_MIME_DATABASE, e);
                HashMap::new()
            }
        }
    };
}

/// 解析 `mime.types` 格式的文本：每行 `类型 扩展名1 扩展名2 ...`，`#` 开头为注释。
///
/// 同一扩展名出现多次时以首次出现为准。
pub fn parse_mime_database(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let mime = match fields.next() {
            Some(m) => m,
            None => continue,
        };
        for ext in fields {
            map.entry(ext.to_ascii_lowercase())
                .or_insert_with(|| mime.to_string());
        }
    }
    map
}

/// 查询状态码对应的原因短语，未收录的状态码返回 `"Unknown"`。
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("Unknown")
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// HTTP 请求方法
///
/// 客户端只会发出 `GET`/`POST`；服务端解析到的其他方法保留原文，用于 405 响应与日志。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 提交表单或数据
    Post,
    /// 其他方法（大写形式）
    Other(String),
}

impl HttpRequestMethod {
    /// 从请求行中的方法名构造，大小写不敏感。
    pub fn from_token(token: &str) -> Self {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "GET" => HttpRequestMethod::Get,
            "POST" => HttpRequestMethod::Post,
            _ => HttpRequestMethod::Other(upper),
        }
    }
}

impl fmt::Display for HttpVersion {
    /// 格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Other(m) => write!(f, "{}", m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_token() {
        assert_eq!(HttpRequestMethod::from_token("get"), HttpRequestMethod::Get);
        assert_eq!(HttpRequestMethod::from_token("POST"), HttpRequestMethod::Post);
        assert_eq!(
            HttpRequestMethod::from_token("delete"),
            HttpRequestMethod::Other("DELETE".to_string())
        );
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpRequestMethod::Get.to_string(), "GET");
        assert_eq!(HttpRequestMethod::Other("PUT".into()).to_string(), "PUT");
        assert_eq!(HttpVersion::V1_1.to_string(), "HTTP/1.1");
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(304), "Not Modified");
        assert_eq!(reason_phrase(799), "Unknown");
    }

    #[test]
    fn test_parse_mime_database() {
        let text = "# comment\ntext/html\t\thtml htm\n\napplication/json json\ntext/x-other html\n";
        let map = parse_mime_database(text);
        assert_eq!(map.get("html").map(String::as_str), Some("text/html"));
        assert_eq!(map.get("htm").map(String::as_str), Some("text/html"));
        assert_eq!(map.get("json").map(String::as_str), Some("application/json"));
        assert_eq!(map.len(), 3);
    }
}

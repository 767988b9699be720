// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # URL 解析模块
//!
//! 把用户输入的 URL（或仅有 `主机[:端口][/路径]` 的简写）分解为
//! `(协议, 主机, 端口, 路径, 查询串)`，并负责重定向时 `Location` 的相对解析。
//!
//! 协议、主机与端口的语法分析交给 `url` crate 完成。用户输入的路径与查询串按原样保留，
//! 不做 `.`/`..` 归一化，只有缺省时补 `/`；重定向的相对解析才按 RFC 3986 合并。

use std::fmt;

use log::warn;
use url::{Host, Url};

use crate::exception::Exception;

/// 允许的 URL 协议
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// 协议对应的默认端口
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// 分解后的 URL。
///
/// `path` 总是以 `/` 开头；`query` 为 `Some` 时一定非空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl ParsedUrl {
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// 主机名（IPv6 地址不带方括号）
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// 请求行中使用的目标：`路径[?查询串]`
    pub fn target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// `Host` 头的取值，非默认端口时附带端口号。
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.target())
    }
}

/// 解析用户给出的 URL。
///
/// 没有协议前缀时按 `http://` 处理；缺少端口时按协议取默认端口；缺少路径时取 `/`。
/// `https` 只在语法层面被接受，传输层不会协商 TLS。
pub fn resolve(raw: &str) -> Result<ParsedUrl, Exception> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Exception::InvalidUrl);
    }
    let candidate = if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let url = Url::parse(&candidate).map_err(|_| Exception::InvalidUrl)?;
    let mut parsed = from_url(&url)?;
    let (path, query) = raw_path_and_query(&candidate);
    parsed.path = path;
    parsed.query = query;
    Ok(parsed)
}

// 从 `协议://` 之后第一个 `/`、`?` 或 `#` 处截取原始的路径与查询串，丢弃片段
fn raw_path_and_query(candidate: &str) -> (String, Option<String>) {
    let after_scheme = match candidate.find("://") {
        Some(idx) => &candidate[idx + 3..],
        None => candidate,
    };
    let rest = match after_scheme.find(|c| c == '/' || c == '?' || c == '#') {
        Some(idx) => &after_scheme[idx..],
        None => "",
    };
    let rest = rest.split('#').next().unwrap_or_default();
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    let path = if path.is_empty() { "/" } else { path };
    let query = query.filter(|q| !q.is_empty()).map(str::to_string);
    (path.to_string(), query)
}

/// 以当前请求的 URL 为基准解析重定向目标。
///
/// 带协议的绝对地址直接替换当前 URL，其余形式（`/a`、`a/b`、`../c`、`//host/p`、`?q`）
/// 按照 RFC 3986 的相对引用规则与当前 URL 合并。
pub fn join(base: &ParsedUrl, location: &str) -> Result<ParsedUrl, Exception> {
    let location = location.trim();
    if has_scheme(location) {
        return resolve(location);
    }
    let base_url = Url::parse(&base.to_string()).map_err(|_| Exception::InvalidUrl)?;
    let joined = base_url.join(location).map_err(|_| Exception::InvalidUrl)?;
    from_url(&joined)
}

fn from_url(url: &Url) -> Result<ParsedUrl, Exception> {
    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => {
            warn!("不支持TLS，将以明文TCP连接{}", url);
            Scheme::Https
        }
        _ => return Err(Exception::InvalidUrl),
    };
    let host = match url.host() {
        Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => return Err(Exception::InvalidUrl),
    };
    let port = url.port().unwrap_or_else(|| scheme.default_port());
    let path = match url.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    let query = url.query().filter(|q| !q.is_empty()).map(str::to_string);
    Ok(ParsedUrl {
        scheme,
        host,
        port,
        path,
        query,
    })
}

/// 判断字符串是否以 `协议://` 开头。
fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(0) | None => false,
        Some(idx) => {
            let scheme = &s[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
    }
}

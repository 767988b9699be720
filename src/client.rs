// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 客户端报告模块
//!
//! 把一次顶层请求的结果整理成人类可读的文本：状态分类与解释、重要头部、
//! 按内容类型生成的正文预览，以及重定向链路。另外负责把正文保存到文件。

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::{codec::HttpMessage, redirect::RedirectStep, util::format_file_size};

/// 优先展示的头部，按此顺序输出
pub const IMPORTANT_HEADERS: [&str; 10] = [
    "server",
    "content-type",
    "content-length",
    "date",
    "last-modified",
    "location",
    "set-cookie",
    "cache-control",
    "expires",
    "etag",
];

const RULE: &str = "============================================================";
const THIN_RULE: &str = "----------------------------------------";

lazy_static! {
    static ref TITLE_RE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref LINK_RE: Regex = Regex::new(r"(?i)<a\s+[^>]*href").unwrap();
    static ref IMAGE_RE: Regex = Regex::new(r"(?i)<img\s+[^>]*src").unwrap();
    static ref PARAGRAPH_RE: Regex = Regex::new(r"(?i)<p[^>]*>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// 状态码的分类标签
pub fn status_class(code: u16) -> &'static str {
    match code {
        200..=299 => "[SUCCESS]",
        300..=399 => "[REDIRECT]",
        400..=499 => "[CLIENT_ERROR]",
        500..=599 => "[SERVER_ERROR]",
        _ => "[UNKNOWN]",
    }
}

/// 常见状态码的一句话解释
pub fn explain_status(code: u16) -> String {
    let explanation = match code {
        200 => "OK - Request succeeded",
        201 => "Created - Resource created successfully",
        204 => "No Content - Request succeeded with no content to return",
        301 => "Moved Permanently - Resource permanently moved",
        302 => "Found - Resource temporarily moved",
        303 => "See Other - Redirect with GET method",
        304 => "Not Modified - Resource not modified since last request",
        307 => "Temporary Redirect - Temporary redirect preserving method",
        308 => "Permanent Redirect - Permanent redirect preserving method",
        400 => "Bad Request - Malformed request",
        401 => "Unauthorized - Authentication required",
        403 => "Forbidden - Access forbidden to this resource",
        404 => "Not Found - Resource not found on server",
        405 => "Method Not Allowed - HTTP method not allowed",
        500 => "Internal Server Error - Internal server error",
        501 => "Not Implemented - Functionality not implemented",
        502 => "Bad Gateway - Gateway error",
        503 => "Service Unavailable - Service temporarily unavailable",
        _ => return format!("HTTP status code {}", code),
    };
    explanation.to_string()
}

/// `content-type` -> `Content Type`
fn display_name(header: &str) -> String {
    header
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// HTML 正文的摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlSummary {
    pub title: Option<String>,
    pub links: usize,
    pub images: usize,
    pub paragraphs: usize,
    /// 去掉标签、合并空白后的前 200 个字符
    pub text: String,
}

pub fn summarize_html(html: &str) -> HtmlSummary {
    let title = TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());
    let stripped = TAG_RE.replace_all(html, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<&str>>().join(" ");
    let mut text: String = collapsed.chars().take(200).collect();
    if collapsed.chars().count() > 200 {
        text.push_str("...");
    }
    HtmlSummary {
        title,
        links: LINK_RE.find_iter(html).count(),
        images: IMAGE_RE.find_iter(html).count(),
        paragraphs: PARAGRAPH_RE.find_iter(html).count(),
        text,
    }
}

fn html_preview(out: &mut String, html: &str) {
    let summary = summarize_html(html);
    let _ = writeln!(out, "\n[INFO] HTML PREVIEW:");
    let _ = writeln!(out, "{}", &THIN_RULE[..30]);
    if let Some(title) = &summary.title {
        let _ = writeln!(out, "Title : {}", title);
    }
    let _ = writeln!(out, "Links found       : {}", summary.links);
    let _ = writeln!(out, "Images found      : {}", summary.images);
    let _ = writeln!(out, "Paragraphs        : {}", summary.paragraphs);
    if !summary.text.is_empty() {
        let _ = writeln!(out, "\nExtracted text:");
        let _ = writeln!(out, "\"{}\"", summary.text);
    }
}

fn text_preview(out: &mut String, text: &str) {
    let lines: Vec<&str> = text.split('\n').collect();
    let _ = writeln!(out, "\n[INFO] TEXT PREVIEW:");
    let _ = writeln!(out, "{}", &THIN_RULE[..30]);
    let _ = writeln!(out, "Number of lines : {}", lines.len());
    for (i, line) in lines.iter().take(5).enumerate() {
        if !line.trim().is_empty() {
            let shown: String = line.chars().take(80).collect();
            let _ = writeln!(out, "{:2}: {}", i + 1, shown);
        }
    }
    if lines.len() > 5 {
        let _ = writeln!(out, "... ({} additional lines)", lines.len() - 5);
    }
}

fn json_preview(out: &mut String, text: &str) {
    let _ = writeln!(out, "\n[INFO] JSON PREVIEW:");
    let _ = writeln!(out, "{}", &THIN_RULE[..30]);
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => {
            let keys: Vec<&String> = map.keys().take(10).collect();
            let _ = writeln!(out, "Type : JSON Object ({} keys)", map.len());
            let _ = writeln!(out, "Keys : {:?}", keys);
        }
        Ok(Value::Array(items)) => {
            let _ = writeln!(out, "Type : JSON Array ({} elements)", items.len());
        }
        Ok(_) => {
            let _ = writeln!(out, "Type : Simple JSON value");
        }
        Err(_) => {
            let head: String = text.chars().take(100).collect();
            let _ = writeln!(out, "Malformed JSON - displaying as text");
            let _ = writeln!(out, "Beginning : {}...", head);
        }
    }
}

/// 生成一次响应的完整报告。`show_all_headers` 为假时只列出重要头部。
pub fn render_response(response: &HttpMessage, show_all_headers: bool) -> String {
    let mut out = String::new();
    let code = response.status_code().unwrap_or(0);
    let _ = writeln!(out, "\n{}", RULE);
    let _ = writeln!(out, "[INFO] HTTP RESPONSE RECEIVED");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        "Status    : {} {} {}",
        status_class(code),
        code,
        response.reason().unwrap_or_default()
    );
    let _ = writeln!(out, "Version   : {}", response.version());
    let _ = writeln!(out, "Size      : {} bytes", response.raw_length());
    let _ = writeln!(out, "Explanation : {}", explain_status(code));

    let headers = response.headers();
    if !headers.is_empty() {
        let _ = writeln!(out, "\n[INFO] MAIN HEADERS:");
        let _ = writeln!(out, "{}", THIN_RULE);
        for name in IMPORTANT_HEADERS.iter() {
            if let Some(value) = headers.get(*name) {
                let _ = writeln!(out, "{:<15} : {}", display_name(name), value);
            }
        }
        let mut others: Vec<(&String, &String)> = headers
            .iter()
            .filter(|(name, _)| !IMPORTANT_HEADERS.contains(&name.as_str()))
            .collect();
        if show_all_headers && !others.is_empty() {
            others.sort();
            let _ = writeln!(out, "\n[INFO] ALL HEADERS:");
            let _ = writeln!(out, "{}", THIN_RULE);
            for (name, value) in others {
                let _ = writeln!(out, "{:<20} : {}", display_name(name), value);
            }
        }
    }

    let body = response.body();
    if body.is_empty() {
        let _ = writeln!(out, "\n[INFO] CONTENT: No content received");
    } else {
        let content_type = response.header("content-type").unwrap_or("unknown");
        let _ = writeln!(out, "\n[INFO] CONTENT:");
        let _ = writeln!(out, "{}", THIN_RULE);
        let _ = writeln!(
            out,
            "Content size      : {} bytes ({})",
            body.len(),
            format_file_size(body.len() as u64)
        );
        let _ = writeln!(out, "Content type      : {}", content_type);
        let text = response.body_text();
        if content_type.contains("text/html") {
            html_preview(&mut out, &text);
        } else if content_type.contains("text/plain") {
            text_preview(&mut out, &text);
        } else if content_type.contains("application/json") {
            json_preview(&mut out, &text);
        } else {
            let _ = writeln!(out, "\n[INFO] BINARY/OTHER CONTENT:");
            let _ = writeln!(out, "{}", &THIN_RULE[..30]);
            let _ = writeln!(out, "Cannot display preview of this content type");
            let _ = writeln!(out, "Use --save to examine the file");
        }
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

/// 重定向链路。只有一步（没有发生重定向）时返回 `None`。
pub fn render_trace(trace: &[RedirectStep]) -> Option<String> {
    if trace.len() < 2 {
        return None;
    }
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", RULE);
    let _ = writeln!(out, "[INFO] REDIRECTION TRACE");
    let _ = writeln!(out, "{}", RULE);
    for (i, step) in trace.iter().enumerate() {
        let tag = if i == trace.len() - 1 {
            "[FINAL]"
        } else {
            "[REDIRECT]"
        };
        let _ = writeln!(
            out,
            "Step {}: {} {} {}",
            i + 1,
            step.status_code,
            step.reason,
            tag
        );
        let _ = writeln!(out, "         {}", step.url);
    }
    let _ = writeln!(out, "[INFO] Total redirections followed: {}", trace.len() - 1);
    let _ = writeln!(out, "{}", RULE);
    Some(out)
}

/// 没有扩展名的文件名会追加时间戳与 `.html` 后缀。
pub fn save_path(name: &str, now: &DateTime<Local>) -> PathBuf {
    let path = PathBuf::from(name);
    if path.extension().is_some() {
        return path;
    }
    PathBuf::from(format!("{}_{}.html", name, now.format("%Y%m%d_%H%M%S")))
}

/// 把正文原样写入文件，必要时创建上级目录，返回写入的字节数。
pub fn save_body(path: &Path, body: &[u8]) -> io::Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, body)?;
    Ok(fs::metadata(path)?.len())
}

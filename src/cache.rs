use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

// 条件请求的判定结果，每个请求现算，不做存储
#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    NotModified,
    Send {
        content: Bytes,
        last_modified: DateTime<Utc>,
    },
}

// 解析 HTTP-date。依次尝试 RFC 1123（含 RFC 2822 的变体）、RFC 850 和 asctime 三种格式
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    let naive_formats = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];
    naive_formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// 文件时间精确到秒，与 HTTP-date 的精度保持一致
pub fn to_http_time(time: SystemTime) -> DateTime<Utc> {
    let date: DateTime<Utc> = time.into();
    Utc.timestamp_opt(date.timestamp(), 0)
        .single()
        .unwrap_or(date)
}

// 文件修改时间不晚于 If-Modified-Since 时才命中；日期无法解析时视为未命中
pub fn is_not_modified(last_modified: SystemTime, if_modified_since: Option<&str>) -> bool {
    let since = match if_modified_since.and_then(parse_http_date) {
        Some(d) => d,
        None => return false,
    };
    to_http_time(last_modified) <= since
}

// 先判定条件请求，只有需要发送时才读取文件内容
pub fn evaluate(
    path: &Path,
    last_modified: SystemTime,
    if_modified_since: Option<&str>,
) -> io::Result<CacheDecision> {
    if is_not_modified(last_modified, if_modified_since) {
        return Ok(CacheDecision::NotModified);
    }
    let content = fs::read(path)?;
    Ok(CacheDecision::Send {
        content: Bytes::from(content),
        last_modified: to_http_time(last_modified),
    })
}

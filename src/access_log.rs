//! 访问日志：每个请求一行 Apache Common Log Format。
//!
//! 每次写入都以追加模式打开文件、整行一次写出、刷新后关闭；
//! 多个连接的写入由一把互斥锁串行化，保证行与行之间不会交错。

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use log::warn;

pub struct AccessLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AccessLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `127.0.0.1 - - [21/Sep/2025:14:30:45 +0000] "GET /index.html" 200 1234`
    pub fn format_entry(
        client_ip: &str,
        time: &DateTime<Utc>,
        request_line: &str,
        status_code: u16,
        bytes: u64,
    ) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}\n",
            client_ip,
            time.format("%d/%b/%Y:%H:%M:%S +0000"),
            escape_request_line(request_line),
            status_code,
            bytes
        )
    }

    /// 追加一行。写入失败只记录警告，不影响请求处理。
    pub fn record(&self, client_ip: &str, request_line: &str, status_code: u16, bytes: u64) {
        let entry = Self::format_entry(client_ip, &Utc::now(), request_line, status_code, bytes);
        if let Err(e) = self.append(&entry) {
            warn!("无法写入访问日志{}：{}", self.path.display(), e);
        }
    }

    fn append(&self, entry: &str) -> io::Result<()> {
        // 锁被毒化时仍然可以继续写：锁只保护文件写入的顺序，不保护任何数据
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())?;
        file.flush()
    }
}

// 请求路径经过百分号解码，可能含有换行或引号，写入前转义以保证一行一条
fn escape_request_line(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for c in line.chars() {
        if c.is_control() || c == '"' || c == '\\' {
            escaped.extend(c.escape_default());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

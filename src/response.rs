use crate::{param::*, util::HtmlBuilder};

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, error};

use std::path::Path;

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    date: DateTime<Utc>,
    server_name: String,
    last_modified: Option<DateTime<Utc>>,
    location: Option<String>,
    allow: Option<Vec<HttpRequestMethod>>,
    content: Option<Bytes>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            last_modified: None,
            location: None,
            allow: None,
            content: None,
        }
    }

    pub fn from_bytes(code: u16, content_type: &str, content: Bytes) -> Self {
        let mut response = Self::new();
        response.content_type = Some(content_type.to_string());
        response.content = Some(content);
        response.set_code(code).to_owned()
    }

    pub fn from_html(code: u16, html: &str) -> Self {
        Self::from_bytes(
            code,
            "text/html; charset=utf-8",
            Bytes::from(html.to_string()),
        )
    }

    /// 静态文件的 200 响应，带 `Last-Modified`
    pub fn from_file(content: Bytes, mime: &str, last_modified: DateTime<Utc>) -> Self {
        let mut response = Self::from_bytes(200, mime, content);
        response.last_modified = Some(last_modified);
        response
    }

    /// 内置的状态页，`note` 为 `None` 时使用标准原因短语
    pub fn status_page(code: u16, note: Option<&str>) -> Self {
        let html = HtmlBuilder::from_status_code(code, note).build();
        Self::from_html(code, &html)
    }

    pub fn not_modified() -> Self {
        Self::new().set_code(304).to_owned()
    }

    pub fn redirect(code: u16, location: &str) -> Self {
        let html = HtmlBuilder::from_redirect(code, location).build();
        let mut response = Self::from_html(code, &html);
        response.location = Some(location.to_string());
        response
    }

    pub fn method_not_allowed() -> Self {
        let note = "<p>请求方法不被支持。本服务器只接受 GET 与 POST。</p>";
        let mut response = Self::status_page(405, Some(note));
        response.allow = Some(vec![HttpRequestMethod::Get, HttpRequestMethod::Post]);
        response
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("未收录的状态码：{}", code);
                reason_phrase(code).to_string()
            }
        };
        self
    }

    /// 缓存策略：HTML 每次都要重新验证，其余资源允许缓存一小时
    pub fn cache_control(&self) -> Option<&'static str> {
        self.content_type.as_ref().map(|t| {
            if t.starts_with("text/html") {
                "no-cache, must-revalidate"
            } else {
                "public, max-age=3600"
            }
        })
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        if let Some(location) = &self.location {
            header.push_str(&format!("Location: {}{}", location, CRLF));
        }
        if let Some(allow) = &self.allow {
            let methods: Vec<String> = allow.iter().map(|m| m.to_string()).collect();
            header.push_str(&format!("Allow: {}{}", methods.join(", "), CRLF));
        }
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content_length(), CRLF));
        if let Some(modified) = &self.last_modified {
            header.push_str(&format!("Last-Modified: {}{}", format_date(modified), CRLF));
        }
        if let Some(policy) = self.cache_control() {
            header.push_str(&format!("Cache-Control: {}{}", policy, CRLF));
        }
        header.push_str("Connection: close");
        header.push_str(CRLF);
        header.push_str(CRLF);
        debug!("响应头构建完成，状态：{} {}", self.status_code, self.information);

        let mut bytes = header.into_bytes();
        if let Some(c) = &self.content {
            bytes.extend_from_slice(c);
        }
        bytes
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> u64 {
        self.content.as_ref().map_or(0, |c| c.len() as u64)
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

/// HTTP-date（RFC 1123，固定使用 GMT）
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 根据扩展名确定 MIME 类型：先查系统 MIME 数据库，再查内置表，最后兜底为二进制流。
pub fn get_mime(path: &Path) -> String {
    let extension = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return OCTET_STREAM.to_string(),
    };
    if let Some(mime) = SYSTEM_MIME_TYPES.get(&extension) {
        return mime.clone();
    }
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v.to_string(),
        None => OCTET_STREAM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn render(response: &Response) -> String {
        String::from_utf8_lossy(&response.as_bytes()).to_string()
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(format_date(&date), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_get_mime_known() {
        assert!(get_mime(Path::new("index.html")).starts_with("text/html"));
        assert!(get_mime(Path::new("photo.PNG")).starts_with("image/png"));
        assert!(get_mime(Path::new("data.json")).starts_with("application/json"));
    }

    #[test]
    fn test_get_mime_unknown() {
        assert_eq!(get_mime(Path::new("blob.zzzunknown")), OCTET_STREAM);
        assert_eq!(get_mime(Path::new("Makefile")), OCTET_STREAM);
    }

    #[test]
    fn test_response_new() {
        let response = Response::new();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.information(), "OK");
        assert_eq!(response.content_length(), 0);
    }

    #[test]
    fn test_header_order_and_connection_close() {
        let response = Response::from_bytes(200, "text/plain", Bytes::from_static(b"hello"));
        let text = render(&response);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\nDate: "));
        assert!(text.contains(&format!("Server: {}\r\n", SERVER_NAME)));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.contains("Cache-Control: public, max-age=3600\r\n"));
        assert!(text.ends_with("Connection: close\r\n\r\nhello"));
    }

    #[test]
    fn test_html_is_not_cached() {
        let response = Response::from_html(200, "<p>x</p>");
        let text = render(&response);
        assert!(text.contains("Cache-Control: no-cache, must-revalidate\r\n"));
    }

    #[test]
    fn test_file_response_has_last_modified() {
        let modified = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let response = Response::from_file(Bytes::from_static(b"abc"), "text/css", modified);
        let text = render(&response);
        assert!(text.contains("Last-Modified: Tue, 02 Jan 2024 03:04:05 GMT\r\n"));
    }

    #[test]
    fn test_not_modified_has_no_body() {
        let response = Response::not_modified();
        let text = render(&response);
        assert!(text.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(!text.contains("Content-Type"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_redirect_has_location() {
        let response = Response::redirect(301, "/index.html");
        let text = render(&response);
        assert!(text.starts_with("HTTP/1.1 301 Moved Permanently\r\n"));
        assert!(text.contains("Location: /index.html\r\n"));
        assert_eq!(response.location(), Some("/index.html"));
    }

    #[test]
    fn test_method_not_allowed_lists_allowed_methods() {
        let response = Response::method_not_allowed();
        let text = render(&response);
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.contains("Allow: GET, POST\r\n"));
        assert!(text.contains("GET 与 POST"));
    }

    #[test]
    fn test_unknown_status_code_does_not_panic() {
        let response = Response::status_page(299, Some("custom"));
        assert_eq!(response.status_code(), 299);
        assert_eq!(response.information(), "Unknown");
    }
}

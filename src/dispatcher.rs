// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求分发模块
//!
//! 服务端对每条连接执行一次性的处理流程：
//! 解析请求 → 查重定向表（命中即 301）→ 按方法分发（GET / POST / 其他一律 405）。
//!
//! 分发是纯同步的：输入原始请求字节与只读的 [`ServerContext`]，输出一个完整的
//! [`Response`]。任何一步失败都被转换为对应的错误页，不会向上抛出。

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use bytes::Bytes;
use log::{debug, error, info, warn};
use url::form_urlencoded;

use crate::{
    cache::{self, CacheDecision},
    codec::{self, HttpMessage},
    config::{self, Config},
    exception::Exception,
    param::*,
    response::{get_mime, Response},
    util::{self, escape_html, HtmlBuilder},
};

/// 服务端启动后冻结的只读配置，所有连接共享同一份。
#[derive(Debug, Clone)]
pub struct ServerContext {
    document_root: PathBuf,
    redirects: HashMap<String, String>,
    timeout: Duration,
    buffer_size: usize,
    max_request_size: usize,
}

impl ServerContext {
    /// `document_root` 必须已经存在，构造时会被规范化为绝对路径。
    pub fn new(document_root: &Path, redirects: HashMap<String, String>) -> io::Result<Self> {
        let defaults = Config::new();
        Ok(Self {
            document_root: document_root.canonicalize()?,
            redirects,
            timeout: Duration::from_secs(defaults.timeout_secs()),
            buffer_size: defaults.buffer_size(),
            max_request_size: defaults.max_request_size(),
        })
    }

    /// 按配置准备文档根目录与重定向表。
    ///
    /// 根目录不存在时会创建默认站点；重定向文件格式错误时记录日志并只使用内置表。
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let root = PathBuf::from(config.www_root());
        if util::create_default_site(&root)? {
            info!("文档根目录{}不存在，已创建默认站点", root.display());
        }
        let redirects = match config::load_redirects(Path::new(config.redirects_file())) {
            Ok(r) => r,
            Err(e) => {
                error!("无法载入重定向文件{}：{}，仅使用内置规则", config.redirects_file(), e);
                config::default_redirects()
            }
        };
        Ok(Self::new(&root, redirects)?.with_limits(
            Duration::from_secs(config.timeout_secs()),
            config.buffer_size(),
            config.max_request_size(),
        ))
    }

    pub fn with_limits(mut self, timeout: Duration, buffer_size: usize, max_request_size: usize) -> Self {
        self.timeout = timeout;
        self.buffer_size = buffer_size;
        self.max_request_size = max_request_size;
        self
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn redirects(&self) -> &HashMap<String, String> {
        &self.redirects
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }
}

/// 一次分发的结果：待发送的响应，以及写入访问日志的请求描述。
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub response: Response,
    /// `方法 路径`，无法解析的请求为 `MALFORMED`
    pub request_line: String,
}

/// 处理一条原始请求。
pub fn dispatch(raw: &[u8], ctx: &ServerContext, id: u128) -> Dispatch {
    let request = match codec::parse_request(raw) {
        Ok(r) => r,
        Err(e) => {
            warn!("[ID{}]无法解析请求：{}，返回400", id, e);
            return Dispatch {
                response: error_response(Exception::MalformedRequest, ctx, ""),
                request_line: "MALFORMED".to_string(),
            };
        }
    };
    let method = HttpRequestMethod::from_token(request.method().unwrap_or_default());
    let target = request.target().unwrap_or("/");
    let path = percent_decode(strip_query(target));
    let request_line = format!("{} {}", method, path);
    debug!("[ID{}]{} {} {}", id, method, target, request.version());

    if let Some(location) = ctx.redirects.get(&path) {
        info!("[ID{}]{}命中重定向规则，301到{}", id, path, location);
        return Dispatch {
            response: Response::redirect(301, location),
            request_line,
        };
    }

    let result = match &method {
        HttpRequestMethod::Get => serve_get(&path, &request, ctx, id),
        HttpRequestMethod::Post => Ok(serve_post(&path, &request, id)),
        HttpRequestMethod::Other(m) => {
            warn!("[ID{}]不支持的请求方法：{}", id, m);
            Err(Exception::MethodNotAllowed)
        }
    };
    let response = match result {
        Ok(r) => r,
        Err(e) => {
            warn!("[ID{}]处理{}失败：{}", id, path, e);
            error_response(e, ctx, &path)
        }
    };
    Dispatch {
        response,
        request_line,
    }
}

fn serve_get(
    path: &str,
    request: &HttpMessage,
    ctx: &ServerContext,
    id: u128,
) -> Result<Response, Exception> {
    let target = resolve_target(&ctx.document_root, path)?;
    if target.is_dir() {
        let index = target.join(INDEX_FILE);
        if index.is_file() {
            let index = ensure_contained(&ctx.document_root, &index)?;
            debug!("[ID{}]目录{}下存在首页，返回{}", id, path, index.display());
            return serve_file(&index, request, id);
        }
        let mut entries = util::read_listing(&target).map_err(|e| {
            error!("[ID{}]无法读取目录{}：{}", id, target.display(), e);
            Exception::InternalFailure
        })?;
        debug!("[ID{}]生成{}的目录列表，共{}项", id, path, entries.len());
        let html = HtmlBuilder::from_dir(path, &mut entries).build();
        return Ok(Response::from_html(200, &html));
    }
    serve_file(&target, request, id)
}

fn serve_file(path: &Path, request: &HttpMessage, id: u128) -> Result<Response, Exception> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| {
            error!("[ID{}]无法读取{}的元数据：{}", id, path.display(), e);
            Exception::InternalFailure
        })?;
    match cache::evaluate(path, modified, request.header("if-modified-since")) {
        Ok(CacheDecision::NotModified) => {
            debug!("[ID{}]{}未修改，返回304", id, path.display());
            Ok(Response::not_modified())
        }
        Ok(CacheDecision::Send {
            content,
            last_modified,
        }) => Ok(Response::from_file(content, &get_mime(path), last_modified)),
        Err(e) => {
            error!("[ID{}]读取文件{}失败：{}", id, path.display(), e);
            Err(Exception::InternalFailure)
        }
    }
}

fn serve_post(path: &str, request: &HttpMessage, id: u128) -> Response {
    let content_type = request.header("content-type");
    let fields = if is_form_urlencoded(content_type) {
        let mut fields: Vec<(String, String)> = parse_form(request.body()).into_iter().collect();
        fields.sort();
        fields
    } else {
        Vec::new()
    };
    debug!(
        "[ID{}]POST {}，Content-Type: {:?}，解析出{}个字段",
        id,
        path,
        content_type,
        fields.len()
    );
    let html = HtmlBuilder::from_post(
        path,
        content_type,
        request.header("content-length"),
        &request.body_text(),
        &fields,
    )
    .build();
    Response::from_html(200, &html)
}

/// 媒体类型（忽略参数）是否正好为 `application/x-www-form-urlencoded`
pub fn is_form_urlencoded(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|t| t.split(';').next())
        .map_or(false, |t| t.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

/// 解析表单请求体。同名字段以第一次出现为准；请求体不是合法 UTF-8 时得到空表。
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    if std::str::from_utf8(body).is_err() {
        return fields;
    }
    for (key, value) in form_urlencoded::parse(body) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}

fn strip_query(target: &str) -> &str {
    match target.find(|c| c == '?' || c == '#') {
        Some(idx) => &target[..idx],
        None => target,
    }
}

/// 百分号解码。非法的转义序列原样保留，解码结果不是 UTF-8 时按有损方式转换。
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                decoded.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// 把解码后的请求路径映射到文档根目录下的文件系统路径。
///
/// 先按 `/` 逐段做词法归一化，`..` 越过根目录或路径含 NUL 时返回 `ForbiddenPath`；
/// 目标存在时再规范化一次，防止符号链接指向根目录之外。
pub fn resolve_target(root: &Path, path: &str) -> Result<PathBuf, Exception> {
    if path.contains('\0') {
        return Err(Exception::ForbiddenPath);
    }
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return Err(Exception::ForbiddenPath);
                }
                resolved.pop();
                depth -= 1;
            }
            s => {
                resolved.push(s);
                depth += 1;
            }
        }
    }
    if !resolved.exists() {
        return Err(Exception::NotFound);
    }
    ensure_contained(root, &resolved)
}

fn ensure_contained(root: &Path, path: &Path) -> Result<PathBuf, Exception> {
    let canonical = match path.canonicalize() {
        Ok(p) => p,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Exception::NotFound),
        Err(_) => return Err(Exception::InternalFailure),
    };
    if !canonical.starts_with(root) {
        return Err(Exception::ForbiddenPath);
    }
    Ok(canonical)
}

/// 把服务端异常转换为错误页。403 与 500 优先使用 `errors/` 下的自定义页面；
/// 405 带 `Allow` 头。
pub fn error_response(e: Exception, ctx: &ServerContext, path: &str) -> Response {
    match e {
        Exception::MalformedRequest => {
            Response::status_page(400, Some("<p>服务器无法理解该请求。</p>"))
        }
        Exception::NotFound => {
            let note = format!("<p>请求的资源 <code>{}</code> 不存在。</p>", escape_html(path));
            Response::status_page(404, Some(&note))
        }
        Exception::ForbiddenPath => custom_error_page(ctx, 403),
        Exception::MethodNotAllowed => Response::method_not_allowed(),
        Exception::RequestTimeout => {
            Response::status_page(408, Some("<p>等待请求数据超时。</p>"))
        }
        Exception::PayloadTooLarge => {
            let note = format!("<p>请求长度超过了 {} 字节的上限。</p>", ctx.max_request_size);
            Response::status_page(413, Some(&note))
        }
        _ => custom_error_page(ctx, 500),
    }
}

fn custom_error_page(ctx: &ServerContext, code: u16) -> Response {
    let page = ctx
        .document_root
        .join(ERROR_PAGE_DIR)
        .join(format!("{}.html", code));
    match fs::read(&page) {
        Ok(content) => Response::from_bytes(code, "text/html; charset=utf-8", Bytes::from(content)),
        Err(_) => Response::status_page(code, None),
    }
}

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use log::{info, warn};
use url::Url;

use crate::param::{reason_phrase, ERROR_PAGE_DIR, INDEX_FILE, SERVER_NAME};

pub struct HtmlBuilder {
    title: String,
    css: String,
    script: String,
    body: String,
}

/// 目录列表中的一项
#[derive(Debug, Clone)]
pub struct ListingEntry {
    name: String,
    is_dir: bool,
    size: u64,
    modified: Option<DateTime<Local>>,
}

impl ListingEntry {
    pub fn new(name: &str, is_dir: bool, size: u64, modified: Option<DateTime<Local>>) -> Self {
        Self {
            name: name.to_string(),
            is_dir,
            size,
            modified,
        }
    }

    fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

const BASE_CSS: &str = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            ";

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{} {}", code, reason_phrase(code));
        let description = match note {
            Some(n) => n.to_string(),
            None => format!("<p>{}</p>", reason_phrase(code)),
        };
        let body = format!(
            r"
            <h1>{} {}</h1>
            {}
            <hr>
            <small>{}</small>
            ",
            code,
            reason_phrase(code),
            description,
            SERVER_NAME
        );
        Self {
            title,
            css: BASE_CSS.to_string(),
            script: "".to_string(),
            body,
        }
    }

    pub fn from_redirect(code: u16, location: &str) -> Self {
        let location = escape_html(location);
        let body = format!(
            r#"
            <h1>{} {}</h1>
            <p>资源已移动到 <a href="{}">{}</a>。</p>
            "#,
            code,
            reason_phrase(code),
            location,
            location
        );
        Self {
            title: format!("{} {}", code, reason_phrase(code)),
            css: BASE_CSS.to_string(),
            script: "".to_string(),
            body,
        }
    }

    /// 目录列表页。`url_path` 为请求路径，条目会先排序再输出。
    pub fn from_dir(url_path: &str, entries: &mut [ListingEntry]) -> Self {
        sort_listing(entries);
        let display_path = escape_html(url_path);
        let base = url_path.trim_end_matches('/');

        let mut body = String::new();
        body.push_str(&format!("<h1>{}的文件列表</h1><hr>", display_path));
        body.push_str("<table>");
        body.push_str(
            r#"
            <tr>
                <th>名称</th>
                <th>类型</th>
                <th>大小</th>
                <th>修改时间</th>
            </tr>
            "#,
        );
        if !base.is_empty() {
            let parent = match base.rfind('/') {
                Some(0) | None => "/",
                Some(idx) => &base[..idx],
            };
            body.push_str(&format!(
                r#"
            <tr>
                <td><a href="{}">../</a></td>
                <td>目录</td>
                <td>-</td>
                <td>-</td>
            </tr>
            "#,
                escape_html(&encode_path(parent))
            ));
        }
        for entry in entries.iter() {
            let href = escape_html(&encode_path(&format!("{}/{}", base, entry.name)));
            let name = escape_html(&entry.name);
            if entry.is_dir {
                body.push_str(&format!(
                    r#"
            <tr>
                <td><a href="{}/">{}/</a></td>
                <td>目录</td>
                <td>-</td>
                <td>-</td>
            </tr>
            "#,
                    href, name
                ));
            } else {
                let modified = entry
                    .modified
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                body.push_str(&format!(
                    r#"
            <tr>
                <td><a href="{}">{}</a></td>
                <td>文件</td>
                <td>{} bytes</td>
                <td>{}</td>
            </tr>
            "#,
                    href, name, entry.size, modified
                ));
            }
        }
        body.push_str("</table>");
        let title = format!("{}的文件列表", display_path);
        let css = r"
            table {
                border-collapse: collapse;
                width: 100%;
            }

            td {
                padding: 8px;
                white-space: pre-wrap; /* 保留换行符和空格 */
                border: none; /* 隐藏单元格边框 */
            }

            th {
                padding: 8px;
                text-align: left;
                border: none; /* 隐藏表头边框 */
            }"
        .to_string();
        HtmlBuilder {
            title,
            css,
            script: "".to_string(),
            body,
        }
    }

    /// POST 回显页：请求路径、解析出的表单字段与截断后的原始请求体。
    pub fn from_post(
        url_path: &str,
        content_type: Option<&str>,
        content_length: Option<&str>,
        raw_body: &str,
        fields: &[(String, String)],
    ) -> Self {
        let truncated: String = raw_body.chars().take(500).collect();
        let ellipsis = if raw_body.chars().count() > 500 {
            "..."
        } else {
            ""
        };
        let mut body = format!(
            r"
            <h1>POST 请求已处理</h1>
            <p><strong>路径：</strong>{}</p>
            <p><strong>Content-Type：</strong>{}</p>
            <p><strong>Content-Length：</strong>{}</p>
            <h2>原始请求体</h2>
            <pre>{}{}</pre>
            ",
            escape_html(url_path),
            escape_html(content_type.unwrap_or("未指定")),
            escape_html(content_length.unwrap_or("未指定")),
            escape_html(&truncated),
            ellipsis
        );
        if !fields.is_empty() {
            body.push_str("<h2>表单字段</h2><ul>");
            for (key, value) in fields {
                body.push_str(&format!(
                    "<li>{}: {}</li>",
                    escape_html(key),
                    escape_html(value)
                ));
            }
            body.push_str("</ul>");
        }
        body.push_str(r#"<p><a href="/">返回首页</a></p>"#);
        Self {
            title: "POST 请求已处理".to_string(),
            css: BASE_CSS.to_string(),
            script: "".to_string(),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由{}自动生成 -->
            <html>
                <head>
                    <meta charset="utf-8">
                    <script>{}</script>
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            SERVER_NAME, self.script, self.title, self.css, self.body
        )
    }
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

/// 把解码后的 URL 路径逐段重新百分号编码，用作链接地址。
///
/// `?`、`#`、`%`、空格等字符都会被编码，空段被丢弃，结果总以 `/` 开头。
pub fn encode_path(path: &str) -> String {
    let mut url = match Url::parse("http://localhost/") {
        Ok(u) => u,
        Err(_) => return path.to_string(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .clear()
            .extend(path.split('/').filter(|s| !s.is_empty()));
    }
    url.path().to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 读取目录内容。无法读取元数据的条目（例如悬空的符号链接）会被跳过。
pub fn read_listing(dir: &Path) -> io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();
    for item in fs::read_dir(dir)? {
        let path = item?.path();
        match ListingEntry::from_path(&path) {
            Ok(e) => entries.push(e),
            Err(e) => warn!("跳过无法读取的条目{}：{}", path.display(), e),
        }
    }
    Ok(entries)
}

// 目录在前，同类之间按名称排序（不区分大小写）
fn sort_listing(entries: &mut [ListingEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// 文档根目录不存在时创建它，并写入默认的首页、错误页与测试文件。
///
/// 根目录已存在时什么都不做，返回 `Ok(false)`。
pub fn create_default_site(root: &Path) -> io::Result<bool> {
    if root.exists() {
        return Ok(false);
    }
    let errors = root.join(ERROR_PAGE_DIR);
    let files = root.join("files");
    fs::create_dir_all(&errors)?;
    fs::create_dir_all(&files)?;

    let pages: [(PathBuf, String); 6] = [
        (root.join(INDEX_FILE), default_index()),
        (
            errors.join("403.html"),
            HtmlBuilder::from_status_code(403, Some("<p>你没有访问该资源的权限。</p>")).build(),
        ),
        (
            errors.join("500.html"),
            HtmlBuilder::from_status_code(500, Some("<p>服务器在处理请求时出现了错误。</p>"))
                .build(),
        ),
        (
            files.join("test.txt"),
            "This is a test text file for directory listing.\n".to_string(),
        ),
        (
            files.join("data.json"),
            format!(
                r#"{{"message": "Hello from JSON file", "server": "{}"}}"#,
                SERVER_NAME
            ),
        ),
        (
            files.join("cache-test.html"),
            format!(
                "<!DOCTYPE html>\n<html>\n<head><title>Cache Test</title></head>\n<body>\n\
                 <h1>Cache Test Page</h1>\n<p>生成时间：{}</p>\n\
                 <p>刷新页面即可观察 304 Not Modified 响应。</p>\n</body>\n</html>",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
        ),
    ];
    for (path, content) in pages.iter() {
        fs::write(path, content)?;
    }
    info!("已在{}创建默认站点", root.display());
    Ok(true)
}

fn default_index() -> String {
    let body = r#"
            <h1>httpwire-server 已启动</h1>
            <p>该页面由服务器在首次启动时生成。</p>
            <ul>
                <li><a href="/index.html">首页</a></li>
                <li><a href="/files/">目录列表</a></li>
                <li><a href="/files/test.txt">文本文件</a></li>
                <li><a href="/files/data.json">JSON 文件</a></li>
                <li><a href="/files/cache-test.html">缓存测试（304）</a></li>
                <li><a href="/redirect-test">重定向测试（301）</a></li>
                <li><a href="/missing.html">不存在的页面（404）</a></li>
            </ul>
            <form method="post" action="/submit">
                <input name="name" value="Ann">
                <input name="age" value="5">
                <button type="submit">提交 POST 表单</button>
            </form>
            "#;
    HtmlBuilder {
        title: "httpwire-server".to_string(),
        css: BASE_CSS.to_string(),
        script: "".to_string(),
        body: body.to_string(),
    }
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size() {
        let a = 9926;
        let b = 51800;
        assert_eq!(format_file_size(a), "9.7 KB".to_string());
        assert_eq!(format_file_size(b), "50.6 KB".to_string());
    }

    #[test]
    fn test_file_size_units() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
        assert_eq!(format_file_size(1073741824), "1.0 GB");
        assert_eq!(format_file_size(1099511627776), "1.0 TB");
    }

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("测试404")).build();
        assert!(html.contains("404 Not Found"));
        assert!(html.contains("测试404"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_unknown_code() {
        let html = HtmlBuilder::from_status_code(999, None).build();
        assert!(html.contains("999 Unknown"));
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("/"), "/");
        assert_eq!(encode_path(""), "/");
        assert_eq!(encode_path("/files/sub"), "/files/sub");
        assert_eq!(encode_path("/files/a b.txt"), "/files/a%20b.txt");
        assert_eq!(encode_path("/q?x#y%z"), "/q%3Fx%23y%25z");
        assert_eq!(encode_path("/中文"), "/%E4%B8%AD%E6%96%87");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_sort_listing_dirs_first_case_insensitive() {
        let mut entries = vec![
            ListingEntry::new("beta.txt", false, 1, None),
            ListingEntry::new("Alpha.txt", false, 1, None),
            ListingEntry::new("zeta", true, 0, None),
            ListingEntry::new("Docs", true, 0, None),
        ];
        sort_listing(&mut entries);
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Docs", "zeta", "Alpha.txt", "beta.txt"]);
    }

    #[test]
    fn test_listing_parent_link() {
        let mut entries = vec![ListingEntry::new("a.txt", false, 12, None)];
        let html = HtmlBuilder::from_dir("/files/sub/", &mut entries).build();
        assert!(html.contains(r#"<a href="/files">../</a>"#));
        assert!(html.contains(r#"<a href="/files/sub/a.txt">a.txt</a>"#));
        assert!(html.contains("12 bytes"));

        let html = HtmlBuilder::from_dir("/", &mut entries).build();
        assert!(!html.contains("../"));
        assert!(html.contains(r#"<a href="/a.txt">a.txt</a>"#));
    }

    #[test]
    fn test_post_page_truncates_and_escapes() {
        let raw = "x".repeat(600);
        let fields = vec![("name".to_string(), "<b>Ann</b>".to_string())];
        let html = HtmlBuilder::from_post("/submit", None, Some("600"), &raw, &fields).build();
        assert!(html.contains(&format!("{}...", "x".repeat(500))));
        assert!(!html.contains(&"x".repeat(501)));
        assert!(html.contains("name: &lt;b&gt;Ann&lt;/b&gt;"));
        assert!(html.contains("未指定"));
    }

    #[test]
    fn test_create_default_site() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("www");
        assert!(create_default_site(&root).unwrap());
        assert!(root.join("index.html").is_file());
        assert!(root.join("errors/403.html").is_file());
        assert!(root.join("errors/500.html").is_file());
        assert!(root.join("files/test.txt").is_file());
        assert!(root.join("files/data.json").is_file());
        assert!(root.join("files/cache-test.html").is_file());
        // 已存在时不再覆盖
        assert!(!create_default_site(&root).unwrap());
    }

    #[test]
    fn test_read_listing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("f.txt"), b"abc").unwrap();
        let mut entries = read_listing(dir.path()).unwrap();
        sort_listing(&mut entries);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].name(), "f.txt");
        assert_eq!(entries[1].size, 3);
    }
}

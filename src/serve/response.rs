//! HTTP responses for the preview server.

use chrono::{DateTime, TimeDelta, Utc};
use maud::{DOCTYPE, html};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;
use tiny_http::{Header, Request, Response, StatusCode};

pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN: &str = "text/plain; charset=utf-8";
pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
pub const SVG: &str = "image/svg+xml";

/// Embedded assets are cached for a day.
const ASSET_MAX_AGE: i64 = 86_400;

/// Characters escaped in listing links.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// RFC 7231 date, as used by `Last-Modified` and `Expires`.
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn with_headers<R: Read>(mut response: Response<R>, headers: &[(&str, &str)]) -> Response<R> {
    for (key, value) in headers {
        if let Ok(header) = Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    response
}

/// A compiled page. Never cached.
pub fn send_page(request: Request, body: Vec<u8>) -> io::Result<()> {
    let response = with_headers(
        Response::from_data(body),
        &[("Content-Type", HTML), ("Cache-Control", "no-store")],
    );
    request.respond(response)
}

/// Headers of a document without compiling it, for the reload client.
pub fn send_document_head(request: Request, source: &Path) -> io::Result<()> {
    let modified = fs::metadata(source).and_then(|m| m.modified());
    let Ok(modified) = modified else {
        return send_status(request, 404, "404 Not Found");
    };
    let last_modified = http_date(DateTime::<Utc>::from(modified));
    let response = with_headers(
        Response::empty(StatusCode(200)),
        &[
            ("Content-Type", HTML),
            ("Last-Modified", &last_modified),
            ("Cache-Control", "no-store"),
        ],
    );
    request.respond(response)
}

/// An embedded asset with a one-day cache lifetime.
pub fn send_asset(request: Request, content_type: &str, body: &[u8]) -> io::Result<()> {
    let expires = http_date(Utc::now() + TimeDelta::seconds(ASSET_MAX_AGE));
    let max_age = format!("max-age={ASSET_MAX_AGE}");
    let response = with_headers(
        Response::from_data(body.to_vec()),
        &[
            ("Content-Type", content_type),
            ("Cache-Control", &max_age),
            ("Expires", &expires),
        ],
    );
    request.respond(response)
}

/// A file from the served folder, with caching disabled.
pub fn send_file(request: Request, path: &Path) -> io::Result<()> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(_) => return send_status(request, 404, "404 Not Found"),
    };
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or_else(|_| SystemTime::now());
    let last_modified = http_date(DateTime::<Utc>::from(modified));
    let ext = path.extension().and_then(|e| e.to_str());
    let response = with_headers(
        Response::from_data(body),
        &[
            ("Content-Type", mime_type(ext)),
            ("Last-Modified", &last_modified),
            ("Cache-Control", "no-store"),
        ],
    );
    request.respond(response)
}

pub fn send_listing(request: Request, dir: &Path, url_path: &str) -> io::Result<()> {
    let mut entries: Vec<(String, bool)> = match fs::read_dir(dir) {
        Ok(read) => read
            .filter_map(Result::ok)
            .map(|e| {
                let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
                (e.file_name().to_string_lossy().into_owned(), is_dir)
            })
            .collect(),
        Err(_) => return send_status(request, 404, "404 Not Found"),
    };
    entries.sort();

    let page = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (url_path) }
            }
            body {
                h1 { (url_path) }
                ul {
                    @for (name, is_dir) in &entries {
                        @let shown = if *is_dir { format!("{name}/") } else { name.clone() };
                        li {
                            a href=(utf8_percent_encode(&shown, PATH_SEGMENT).to_string()) { (shown) }
                        }
                    }
                }
            }
        }
    };
    let response = with_headers(
        Response::from_string(page.into_string()),
        &[("Content-Type", HTML), ("Cache-Control", "no-store")],
    );
    request.respond(response)
}

pub fn send_redirect(request: Request, location: &str) -> io::Result<()> {
    let response = with_headers(
        Response::empty(StatusCode(301)),
        &[("Location", location)],
    );
    request.respond(response)
}

pub fn send_status(request: Request, status: u16, message: &str) -> io::Result<()> {
    let response = with_headers(
        Response::from_string(message).with_status_code(StatusCode(status)),
        &[("Content-Type", PLAIN)],
    );
    request.respond(response)
}

/// Only `GET` and `HEAD` are served.
pub fn send_method_not_allowed(request: Request) -> io::Result<()> {
    let response = with_headers(
        Response::from_string("405 Method Not Allowed").with_status_code(StatusCode(405)),
        &[("Content-Type", PLAIN), ("Allow", "GET, HEAD")],
    );
    request.respond(response)
}

/// Content type by file extension.
pub fn mime_type(ext: Option<&str>) -> &'static str {
    let ext = ext.map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => JAVASCRIPT,
        Some("json") => "application/json",
        Some("md" | "txt") => PLAIN,
        Some("xml") => "application/xml",
        Some("svg") => SVG,
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

//! HTTP backend for the trace file picker.

use std::io::{self, Read};

use eyre::{eyre, Result};
use fibereport::{Error, FileBrowser, ServerConfig, UploadedFile};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A response, independent of the server that ends up sending it.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => Self::error(500, &e.to_string()),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
        }
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateFolder {
    #[serde(default)]
    name: String,
    #[serde(default)]
    path: String,
}

/// Runs the server until the process is stopped.
pub fn serve(config: &ServerConfig) -> Result<()> {
    let browser = FileBrowser::new(&config.root).with_max_upload_files(config.max_upload_files);
    let addr = config.address();
    let server = tiny_http::Server::http(&addr)
        .map_err(|e| eyre!("failed to start server on {}: {}", addr, e))?;
    info!("Serving {} on http://{}", browser.root().display(), addr);

    for mut request in server.incoming_requests() {
        let method = request.method().as_str().to_string();
        let url = request.url().to_string();
        let content_type = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Content-Type"))
            .map(|h| h.value.as_str().to_string());
        let response = match read_body(request.as_reader(), config.max_request_bytes) {
            Ok(Some(body)) => handle(&browser, &method, &url, content_type.as_deref(), &body),
            Ok(None) => {
                warn!(
                    "Refusing {} {}: body exceeds {} bytes",
                    method, url, config.max_request_bytes
                );
                ApiResponse::error(413, "request body too large")
            }
            Err(e) => {
                warn!("Failed to read request body for {} {}: {}", method, url, e);
                continue;
            }
        };
        debug!("{} {} -> {}", method, url, response.status);
        let mut reply = tiny_http::Response::from_data(response.body)
            .with_status_code(response.status);
        for (field, value) in [
            ("Content-Type", response.content_type),
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
            ("Access-Control-Allow-Headers", "Content-Type"),
        ] {
            if let Ok(header) = tiny_http::Header::from_bytes(field.as_bytes(), value.as_bytes()) {
                reply.add_header(header);
            }
        }
        if let Err(e) = request.respond(reply) {
            warn!("Failed to respond to {} {}: {}", method, url, e);
        }
    }
    Ok(())
}

/// Reads at most `limit` bytes of a request body. Returns `None` if the body
/// is longer than that.
fn read_body<R: Read>(reader: R, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        Ok(None)
    } else {
        Ok(Some(body))
    }
}

/// Routes a single request.
pub fn handle(
    browser: &FileBrowser,
    method: &str,
    url: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> ApiResponse {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };
    match (method, path) {
        ("OPTIONS", _) => ApiResponse::empty(204),
        ("GET", "/api/files") => {
            let rel = query_param(query, "path").unwrap_or_default();
            match browser.list(&rel) {
                Ok(listing) => ApiResponse::json(200, &listing),
                Err(e) => error_response(e),
            }
        }
        ("POST", "/api/folders") => {
            let req: CreateFolder = match serde_json::from_slice(body) {
                Ok(req) => req,
                Err(e) => return ApiResponse::error(400, &e.to_string()),
            };
            match browser.create_folder(&req.name, &req.path) {
                Ok(_) => ApiResponse::json(
                    200,
                    &serde_json::json!({ "message": "Directory created successfully" }),
                ),
                Err(e) => error_response(e),
            }
        }
        ("POST", "/api/upload") => {
            let boundary = match content_type.and_then(multipart_boundary) {
                Some(boundary) => boundary,
                None => return ApiResponse::error(400, "expected multipart/form-data"),
            };
            let parts = match parse_multipart(body, &boundary) {
                Ok(parts) => parts,
                Err(e) => return ApiResponse::error(400, &e),
            };
            let mut rel = String::new();
            let mut files = Vec::new();
            for part in parts {
                match part.filename {
                    Some(filename) => files.push(UploadedFile {
                        name: filename,
                        content: part.data,
                    }),
                    None if part.name == "path" => {
                        rel = String::from_utf8_lossy(&part.data).into_owned()
                    }
                    None => (),
                }
            }
            if files.is_empty() {
                return ApiResponse::error(400, "no files in upload");
            }
            match browser.upload(&rel, files) {
                Ok(outcomes) => ApiResponse::json(200, &outcomes),
                Err(e) => error_response(e),
            }
        }
        _ => ApiResponse::error(404, "not found"),
    }
}

fn error_response(e: Error) -> ApiResponse {
    let status = match e {
        Error::InvalidFolderName(_)
        | Error::PathOutsideRoot(_)
        | Error::TooManyFiles { .. } => 400,
        _ => 500,
    };
    ApiResponse::error(status, &e.to_string())
}

/// The decoded value of the first query parameter with the given name.
fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| match pair.split_once('=') {
            Some((key, value)) => Some((key, value)),
            None if !pair.is_empty() => Some((pair, "")),
            None => None,
        })
        .find(|(key, _)| percent_decode(key) == name)
        .map(|(_, value)| percent_decode(value))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => decoded.push(b' '),
            b'%' => match bytes.get(i + 1..i + 3).and_then(|h| hex_pair(h[0], h[1])) {
                Some(b) => {
                    decoded.push(b);
                    i += 2;
                }
                None => decoded.push(b'%'),
            },
            b => decoded.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

#[derive(Debug)]
struct Part {
    name: String,
    filename: Option<String>,
    data: Vec<u8>,
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';').map(str::trim);
    if !params.next()?.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

// Every delimiter but the first is preceded by a line break that belongs to
// it rather than to the content of the part before.
fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>, String> {
    let first = format!("--{}", boundary).into_bytes();
    let delimiter = format!("\r\n--{}", boundary).into_bytes();
    let mut pos = find(body, &first, 0).ok_or("missing multipart boundary")? + first.len();
    let mut parts = Vec::new();
    loop {
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        let start = find(body, b"\r\n", pos).ok_or("unterminated multipart body")? + 2;
        let next = find(body, &delimiter, start).ok_or("unterminated multipart body")?;
        parts.push(parse_part(&body[start..next])?);
        pos = next + delimiter.len();
    }
}

fn parse_part(segment: &[u8]) -> Result<Part, String> {
    let split = find(segment, b"\r\n\r\n", 0).ok_or("multipart part without headers")?;
    let headers = String::from_utf8_lossy(&segment[..split]);
    let data = segment[split + 4..].to_vec();
    let disposition = headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(field, _)| field.trim().eq_ignore_ascii_case("Content-Disposition"))
        .map(|(_, value)| value.to_string())
        .ok_or("multipart part without Content-Disposition")?;
    let mut name = None;
    let mut filename = None;
    for param in disposition.split(';').map(str::trim) {
        if let Some((key, value)) = param.split_once('=') {
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "name" => name = Some(value),
                "filename" => filename = Some(value),
                _ => (),
            }
        }
    }
    Ok(Part {
        name: name.ok_or("multipart part without a name")?,
        filename,
        data,
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn json(response: &ApiResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    fn multipart(boundary: &str, path: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"path\"\r\n\r\n{p}\r\n",
            b = boundary,
            p = path
        );
        for (name, content) in files {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{n}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n",
                b = boundary,
                n = name,
                c = content
            ));
        }
        body.push_str(&format!("--{}--\r\n", boundary));
        body.into_bytes()
    }

    #[test]
    fn lists_files_with_decoded_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("site a").join("b")).unwrap();
        fs::write(dir.path().join("site a").join("t2.sor"), "").unwrap();
        fs::write(dir.path().join("site a").join("t10.sor"), "").unwrap();
        let browser = FileBrowser::new(dir.path());

        let response = handle(&browser, "GET", "/api/files?path=site%20a", None, &[]);
        assert_eq!(response.status, 200);
        assert_eq!(
            json(&response),
            serde_json::json!({
                "currentPath": "site a",
                "files": [
                    {"name": "b", "isDirectory": true},
                    {"name": "t2.sor", "isDirectory": false},
                    {"name": "t10.sor", "isDirectory": false},
                ]
            })
        );

        let response = handle(&browser, "GET", "/api/files?path=..", None, &[]);
        assert_eq!(response.status, 400);
        let response = handle(&browser, "GET", "/api/files?path=missing", None, &[]);
        assert_eq!(response.status, 500);
    }

    #[test]
    fn creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let browser = FileBrowser::new(dir.path());

        let response = handle(
            &browser,
            "POST",
            "/api/folders",
            Some("application/json"),
            br#"{"name": "new", "path": "x/y"}"#,
        );
        assert_eq!(response.status, 200);
        assert!(dir.path().join("x").join("y").join("new").is_dir());

        for body in [
            &br#"{"name": "", "path": ""}"#[..],
            &br#"{"name": "a/b"}"#[..],
            &br#"{"name": ".."}"#[..],
            &b"not json"[..],
        ] {
            let response = handle(&browser, "POST", "/api/folders", None, body);
            assert_eq!(response.status, 400);
        }
    }

    #[test]
    fn uploads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("in")).unwrap();
        let browser = FileBrowser::new(dir.path()).with_max_upload_files(2);
        let content_type = "multipart/form-data; boundary=XyZ";

        let body = multipart("XyZ", "in", &[("a.sor", "one"), ("b.sor", "two")]);
        let response = handle(&browser, "POST", "/api/upload", Some(content_type), &body);
        assert_eq!(response.status, 200);
        assert_eq!(
            json(&response),
            serde_json::json!([
                {"name": "a.sor", "ok": true},
                {"name": "b.sor", "ok": true},
            ])
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("in").join("b.sor")).unwrap(),
            "two"
        );

        let body = multipart("XyZ", "", &[("a", "1"), ("b", "2"), ("c", "3")]);
        let response = handle(&browser, "POST", "/api/upload", Some(content_type), &body);
        assert_eq!(response.status, 400);

        let response = handle(&browser, "POST", "/api/upload", Some("text/plain"), &body);
        assert_eq!(response.status, 400);
    }

    #[test]
    fn upload_content_may_contain_the_boundary_text() {
        let dir = tempfile::tempdir().unwrap();
        let browser = FileBrowser::new(dir.path());
        let content_type = "multipart/form-data; boundary=XyZ";

        let body = multipart(
            "XyZ",
            "",
            &[("a.sor", "head--XyZtail"), ("b.sor", "line\r\n"), ("c.sor", "")],
        );
        let response = handle(&browser, "POST", "/api/upload", Some(content_type), &body);
        assert_eq!(response.status, 200);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.sor")).unwrap(),
            "head--XyZtail"
        );
        assert_eq!(fs::read_to_string(dir.path().join("b.sor")).unwrap(), "line\r\n");
        assert_eq!(fs::read_to_string(dir.path().join("c.sor")).unwrap(), "");
    }

    #[test]
    fn oversized_bodies_are_not_read() {
        let body = vec![b'x'; 16];
        assert_eq!(read_body(&body[..], 16).unwrap(), Some(body.clone()));
        assert_eq!(read_body(&body[..], 15).unwrap(), None);
        assert_eq!(read_body(&b""[..], 0).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn unknown_routes() {
        let browser = FileBrowser::new("public");
        assert_eq!(handle(&browser, "GET", "/api/nope", None, &[]).status, 404);
        assert_eq!(handle(&browser, "DELETE", "/api/files", None, &[]).status, 404);
        assert_eq!(handle(&browser, "OPTIONS", "/api/upload", None, &[]).status, 204);
    }

    #[test]
    fn decodes_query_values() {
        assert_eq!(percent_decode("a%2Fb+c%zz%4"), "a/b c%zz%4");
        assert_eq!(
            query_param("x=1&path=%C3%A9t%C3%A9", "path").as_deref(),
            Some("été")
        );
        assert_eq!(query_param("flag", "flag").as_deref(), Some(""));
        assert_eq!(query_param("", "path"), None);
    }

    #[test]
    fn boundary_detection() {
        assert_eq!(
            multipart_boundary("multipart/form-data; boundary=\"abc\"").as_deref(),
            Some("abc")
        );
        assert_eq!(multipart_boundary("application/json"), None);
    }
}

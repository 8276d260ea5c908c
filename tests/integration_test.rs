// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use webscopes::{serve, Config, ServerState, WebApplication};

const CONFIG: &str = r#"
port = 0
worker_threads = 1
local = true
supported_locales = ["de_AT", "en_US"]
default_locale = "en_US"
default_menu_items = ["home"]

[[menu]]
id = "home"
title = "Home"

[[menu]]
id = "about"
title = "About"

[[menu]]
id = "admin"
title = "Admin"
requires_attribute = "admin"
"#;

/// 在随机端口上启动服务器
async fn start_server() -> (SocketAddr, Arc<ServerState>) {
    let config = Config::from_toml_str(CONFIG);
    let app = Arc::new(WebApplication::from_config(&config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState::new());
    tokio::spawn(serve(listener, app, Arc::clone(&state)));
    (addr, state)
}

async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut buffer = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buffer))
        .await
        .unwrap()
        .unwrap();
    buffer
}

struct ParsedResponse {
    status_code: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ParsedResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `Set-Cookie` 中的 `NAME=VALUE` 部分
    fn session_cookie(&self) -> Option<String> {
        self.header("Set-Cookie")
            .and_then(|c| c.split(';').next())
            .map(str::to_string)
    }
}

fn parse_response(raw: &[u8]) -> ParsedResponse {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response without header terminator");
    let head = String::from_utf8_lossy(&raw[..end]).into_owned();
    let mut lines = head.split("\r\n");

    // 解析状态行
    let status_code = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);

    // 解析头部
    let headers = lines
        .filter_map(|l| l.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    ParsedResponse {
        status_code,
        headers,
        body: raw[end + 4..].to_vec(),
    }
}

async fn get(addr: SocketAddr, target: &str, extra_headers: &str) -> ParsedResponse {
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\n{}\r\n",
        target, extra_headers
    );
    parse_response(&send_raw(addr, request.as_bytes()).await)
}

#[tokio::test]
async fn test_default_page() {
    let (addr, _state) = start_server().await;
    let response = get(addr, "/", "").await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("Content-Type"), Some("text/html;charset=utf-8"));
    assert_eq!(response.header("Content-Language"), Some("en-US"));
    assert!(response.header("Content-Encoding").is_none());
    assert!(response.header("Set-Cookie").is_none());
    assert_eq!(
        response.header("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );
    assert!(response.text().contains(r#"<p id="menuitem">home</p>"#));
}

/// 通过参数选择的菜单项与显示语言在后续请求中被保留
#[tokio::test]
async fn test_menu_and_locale_persist_in_session() {
    let (addr, _state) = start_server().await;

    let first = get(addr, "/?menuitem=about&locale=de_AT", "").await;
    assert_eq!(first.status_code, 200);
    assert_eq!(first.header("Content-Language"), Some("de-AT"));
    let cookie = first.session_cookie().unwrap();
    assert!(cookie.starts_with("SESSIONID="));

    let second = get(addr, "/", &format!("Cookie: {}\r\n", cookie)).await;
    assert_eq!(second.status_code, 200);
    assert_eq!(second.header("Content-Language"), Some("de-AT"));
    assert!(second.header("Set-Cookie").is_none());
    assert!(second.text().contains(r#"<p id="menuitem">about</p>"#));
}

/// 指向被过滤页面的参数不改变会话中的菜单项
#[tokio::test]
async fn test_filtered_menu_item_keeps_session_value() {
    let (addr, _state) = start_server().await;

    let first = get(addr, "/?menuitem=about", "").await;
    let cookie = first.session_cookie().unwrap();

    let second = get(addr, "/?menuitem=admin", &format!("Cookie: {}\r\n", cookie)).await;
    assert!(second.text().contains(r#"<p id="menuitem">about</p>"#));
    assert!(!second.text().contains("Admin"));

    let third = get(addr, "/", &format!("Cookie: {}\r\n", cookie)).await;
    assert!(third.text().contains(r#"<p id="menuitem">about</p>"#));
}

#[tokio::test]
async fn test_unknown_session_cookie_is_replaced() {
    let (addr, _state) = start_server().await;
    let response = get(addr, "/?locale=de_AT", "Cookie: SESSIONID=forged\r\n").await;
    let cookie = response.session_cookie().unwrap();
    assert_ne!(cookie, "SESSIONID=forged");
}

#[tokio::test]
async fn test_gzip_negotiation() {
    let (addr, _state) = start_server().await;
    let response = get(addr, "/", "Accept-Encoding: deflate;q=0.5, gzip;q=0.9\r\n").await;

    assert_eq!(response.header("Content-Encoding"), Some("gzip"));
    assert!(response.header("Vary").unwrap().contains("Accept-Encoding"));

    let mut decoded = String::new();
    GzDecoder::new(&response.body[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert!(decoded.contains(r#"<p id="menuitem">home</p>"#));
}

#[tokio::test]
async fn test_refused_encodings_fall_back_to_identity() {
    let (addr, _state) = start_server().await;
    let response = get(addr, "/", "Accept-Encoding: gzip;q=0, br;q=0, *;q=0\r\n").await;
    assert!(response.header("Content-Encoding").is_none());
    assert!(response.text().contains("<!DOCTYPE html>"));
}

#[tokio::test]
async fn test_head_and_options() {
    let (addr, _state) = start_server().await;

    let head = parse_response(
        &send_raw(addr, b"HEAD / HTTP/1.1\r\nHost: localhost\r\n\r\n").await,
    );
    assert_eq!(head.status_code, 200);
    assert!(head.body.is_empty());
    assert!(head.header("Content-Length").unwrap().parse::<usize>().unwrap() > 0);

    let options = parse_response(
        &send_raw(addr, b"OPTIONS * HTTP/1.1\r\nHost: localhost\r\n\r\n").await,
    );
    assert_eq!(options.status_code, 204);
    assert_eq!(options.header("Allow"), Some("GET, HEAD, OPTIONS, POST"));
}

#[tokio::test]
async fn test_form_post_selects_menu_item() {
    let (addr, _state) = start_server().await;
    let body = "menuitem=about&locale=de_AT";
    let request = format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let response = parse_response(&send_raw(addr, request.as_bytes()).await);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("Content-Language"), Some("de-AT"));
    assert!(response.text().contains(r#"<p id="menuitem">about</p>"#));
}

#[tokio::test]
async fn test_multipart_post_selects_menu_item() {
    let (addr, _state) = start_server().await;
    let body = [
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"menuitem\"\r\n\r\n",
        "about\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "hello\r\n",
        "--XyZ--\r\n",
    ]
    .concat();
    let request = format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary=XyZ\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let response = parse_response(&send_raw(addr, request.as_bytes()).await);
    assert_eq!(response.status_code, 200);
    assert!(response.text().contains(r#"<p id="menuitem">about</p>"#));
}

#[tokio::test]
async fn test_stop_refuses_new_connections() {
    let (addr, state) = start_server().await;
    assert_eq!(get(addr, "/", "").await.status_code, 200);

    state.request_stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.is_stopped());

    let refused = tokio::time::timeout(Duration::from_secs(2), async {
        match TcpStream::connect(addr).await {
            Ok(mut stream) => {
                let _ = stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await;
                let mut buffer = Vec::new();
                let _ = stream.read_to_end(&mut buffer).await;
                buffer.is_empty()
            }
            Err(_) => true,
        }
    })
    .await;
    assert!(refused.unwrap_or(true));
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理
//!
//! 主循环接受 TCP 连接，每个连接交给一个独立的 Tokio 任务：读取请求、
//! 交给 `WebApplication` 处理并写回响应。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
};

use crate::{
    app::WebApplication, exception::Exception, request::find_header_end, request::Request,
    response::Response,
};

/// 请求头部允许的最大字节数
const MAX_HEADER_SIZE: usize = 64 * 1024;

/// 服务器运行状态：停机标志与当前活跃连接数
#[derive(Default)]
pub struct ServerState {
    shutdown_flag: Mutex<bool>,
    active_connection: Mutex<u32>,
    shutdown_notify: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("服务器状态锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出停机信号，主循环不再接受新连接
    pub fn request_stop(&self) {
        *lock(&self.shutdown_flag) = true;
        self.shutdown_notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        *lock(&self.shutdown_flag)
    }

    pub fn active_connections(&self) -> u32 {
        *lock(&self.active_connection)
    }

    fn connection_opened(&self) {
        *lock(&self.active_connection) += 1;
    }

    fn connection_closed(&self) {
        let mut count = lock(&self.active_connection);
        *count = count.saturating_sub(1);
    }
}

/// # 主事件循环 (Accept Loop)
///
/// 持续接收新连接并将其分发至 Tokio 线程池进行异步处理，直到 `state` 收到停机信号。
pub async fn serve(listener: TcpListener, app: Arc<WebApplication>, state: Arc<ServerState>) {
    let mut id: u128 = 0;
    loop {
        if state.is_stopped() {
            info!("主循环接收到停机指令，正在退出...");
            break;
        }

        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(a) => a,
                Err(e) => {
                    error!("接受TCP连接失败: {}", e);
                    continue;
                }
            },
            _ = state.shutdown_notify.notified() => continue,
        };
        debug!("新的连接：{}", addr);
        debug!("[ID{}]TCP连接已建立", id);

        let app = Arc::clone(&app);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.connection_opened();
            handle_connection(&mut stream, id, &app).await;
            state.connection_closed();
        });
        id += 1;
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期，包括读取解析请求、处理请求以及发送响应。
async fn handle_connection(stream: &mut TcpStream, id: u128, app: &WebApplication) {
    let buffer = match read_request(stream, id, app.max_request_size()).await {
        Ok(Some(buffer)) => buffer,
        Ok(None) => return,
        Err(e) => {
            warn!("[ID{}]读取HTTP请求失败: {}", id, e);
            write_response(stream, id, &Response::without_request(e.status_code(), id)).await;
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            write_response(stream, id, &Response::without_request(e.status_code(), id)).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let response = app.handle(&request, id);

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, {}ms",
        id,
        request.version(),
        request.target(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
        start_time.elapsed().as_millis(),
    );

    write_response(stream, id, &response).await;
}

async fn write_response(stream: &mut TcpStream, id: u128, response: &Response) {
    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    if let Err(e) = stream.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

/// 头部中声明的 `Content-Length`
fn content_length_of(head: &[u8]) -> Option<u64> {
    String::from_utf8_lossy(head)
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// 读取一个完整的 HTTP 请求：先读到头部结束，再按 `Content-Length` 读取请求体。
/// 连接在发送任何数据前关闭时返回 `Ok(None)`。
async fn read_request(
    stream: &mut TcpStream,
    id: u128,
    max_request_size: u64,
) -> Result<Option<Vec<u8>>, Exception> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = vec![0u8; 8192];

    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }
        if buffer.len() > MAX_HEADER_SIZE {
            return Err(Exception::MalformedRequest);
        }
        match stream.read(&mut chunk).await {
            Ok(0) if buffer.is_empty() => return Ok(None),
            Ok(0) => return Ok(Some(buffer)),
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                return Ok(None);
            }
        }
    };

    let content_length = content_length_of(&buffer[..header_end]).unwrap_or(0);
    if content_length > max_request_size {
        return Err(Exception::RequestTooLarge);
    }
    let total = header_end + 4 + content_length as usize;
    while buffer.len() < total {
        match stream.read(&mut chunk).await {
            Ok(0) => {
                warn!("[ID{}]请求体不完整，期望{}字节", id, content_length);
                break;
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(e) => {
                error!("[ID{}]读取请求体时遇到错误: {}", id, e);
                return Ok(None);
            }
        }
    }
    Ok(Some(buffer))
}

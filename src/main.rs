// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # webscopes 服务器
//!
//! 基于 Tokio 运行时的多线程 Web 服务器，按会话记住用户选择的菜单项与显示语言。
//! 核心功能包括：
//! - 请求参数、multipart 上传与 JSON 请求体的作用域管理
//! - 基于 LRU 的内存会话存储
//! - Accept-* 标头的质量值协商（压缩编码与显示语言）
//! - 后台管理控制台（CLI 指令交互）

use webscopes::{serve, Config, ServerState, WebApplication};

use log::{error, info};
use log4rs;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
};

/// # 程序入口点
///
/// 初始化日志、加载配置、构建应用上下文并启动主事件循环。
fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统: {}", e);
        process::exit(1);
    }

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = match Config::from_toml("config/development.toml") {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!("配置文件已载入");

    // 3. 应用上下文：菜单树、语言管理器与会话存储在启动时构建一次
    let app = match WebApplication::from_config(&config) {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!("无法构建应用上下文: {}", e);
            process::exit(1);
        }
    };

    // 4. 异步运行时定制：根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            error!("无法创建Tokio运行时: {}", e);
            process::exit(1);
        }
    };

    runtime.block_on(run(config, app));
}

async fn run(config: Config, app: Arc<WebApplication>) {
    // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config.port();
    info!("服务端将在{}端口上监听Socket连接", port);
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}地址上监听Socket连接", address);
    let socket = SocketAddrV4::new(address, port);

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let state = Arc::new(ServerState::new());

    // 后台管理控制台，不阻塞监听循环
    tokio::spawn({
        let state = Arc::clone(&state);
        let app = Arc::clone(&app);
        async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut input = String::new();
            loop {
                input.clear();
                match reader.read_line(&mut input).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let cmd = input.trim();
                match cmd {
                    "stop" => {
                        state.request_stop();
                        println!("停机指令已激活，服务器将不再接受新的连接...");
                        break;
                    }
                    "help" => {
                        println!("== webscopes Help ==");
                        println!("stop   - 发出停机信号");
                        println!("status - 查看当前服务器运行状态");
                        println!("help   - 显示此帮助信息");
                        println!("====================");
                    }
                    "status" => {
                        println!("== webscopes 状态 ===");
                        println!("当前活跃连接数: {}", state.active_connections());
                        println!("当前会话数: {}", app.session_store().session_count());
                        println!("====================");
                    }
                    _ => {
                        println!("无效的命令：{}", cmd);
                    }
                }
            }
        }
    });

    serve(listener, app, state).await;
}

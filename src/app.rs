// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用上下文
//!
//! `WebApplication` 在启动时由配置构建一次，持有菜单树、语言管理器、会话存储与
//! 请求管理器，并通过 `Arc` 在所有连接任务之间共享。`handle` 是单个请求的完整处理流程。

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info};

use crate::{
    config::Config,
    exception::Exception,
    locale::LocaleManager,
    menu::{DisplayContext, MenuTree},
    param::HttpRequestMethod,
    request::Request,
    request_manager::{RequestManager, RequestManagerSettings},
    request_scope::RequestWebScope,
    response::Response,
    session::{MemorySessionStore, SessionHandle, SessionStore},
    util::HtmlBuilder,
};

pub struct WebApplication {
    menu_tree: Arc<MenuTree>,
    locale_manager: Arc<LocaleManager>,
    session_store: Arc<dyn SessionStore>,
    request_manager: RequestManager,
    session_cookie: String,
    max_request_size: u64,
    parse_json_body: bool,
}

impl WebApplication {
    /// 使用内存会话存储构建应用
    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        let store = Arc::new(MemorySessionStore::from_capacity(config.session_capacity()));
        Self::with_session_store(config, store)
    }

    pub fn with_session_store(
        config: &Config,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, Exception> {
        let menu_tree = Arc::new(MenuTree::from_config(
            config.menu(),
            config.default_menu_items(),
        )?);
        let locale_manager = Arc::new(LocaleManager::from_tags(
            config.supported_locales(),
            config.default_locale(),
        )?);
        info!(
            "应用{}初始化完成：{}个菜单对象，{}种显示语言",
            config.application_id(),
            menu_tree.len(),
            locale_manager.supported_locales().len()
        );
        let request_manager = RequestManager::new(
            Arc::clone(&menu_tree),
            Arc::clone(&locale_manager),
            RequestManagerSettings::from_config(config),
        );
        Ok(Self {
            menu_tree,
            locale_manager,
            session_store,
            request_manager,
            session_cookie: config.session_cookie().to_string(),
            max_request_size: config.max_request_size(),
            parse_json_body: config.parse_json_body(),
        })
    }

    pub fn menu_tree(&self) -> &MenuTree {
        &self.menu_tree
    }

    pub fn locale_manager(&self) -> &LocaleManager {
        &self.locale_manager
    }

    pub fn session_store(&self) -> &dyn SessionStore {
        self.session_store.as_ref()
    }

    pub fn request_manager(&self) -> &RequestManager {
        &self.request_manager
    }

    pub fn max_request_size(&self) -> u64 {
        self.max_request_size
    }

    pub fn handle(&self, request: &Request, id: u128) -> Response {
        let start_time = Instant::now();
        let method = request.method();
        if method == HttpRequestMethod::Options {
            return Response::options(id);
        }
        let accept_encoding = request.accept_encoding();

        let mut scope = RequestWebScope::new(request, id)
            .with_json_body(self.parse_json_body)
            .with_max_request_size(self.max_request_size);
        scope.init_scope();

        let mut session = SessionHandle::open(
            self.session_store.as_ref(),
            request.cookie(&self.session_cookie),
        );
        self.request_manager.on_request_begin(&scope, &mut session);

        let rendered = self.render(&session);
        let mut response = match rendered {
            Ok((html, language)) => {
                let mut response = Response::from_html(&html, &accept_encoding, id);
                response
                    .set_code(200)
                    .set_date()
                    .set_content_language(&language)
                    .add_vary("Cookie");
                response
            }
            Err(e) => {
                error!("[ID{}]无法确定请求的菜单项或显示语言: {}", id, e);
                Response::from_status_code(e.status_code(), &accept_encoding, id)
            }
        };

        if session.is_new() {
            if let Some(session_id) = session.id() {
                debug!("[ID{}]下发新会话{}", id, session_id);
                response.set_cookie(&format!(
                    "{}={}; Path=/; HttpOnly",
                    self.session_cookie, session_id
                ));
            }
        }
        if method == HttpRequestMethod::Head {
            response.set_headonly();
        }
        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );
        response
    }

    /// 返回渲染好的页面以及 `Content-Language`
    fn render(&self, session: &SessionHandle<'_>) -> Result<(String, String), Exception> {
        let selected = self.request_manager.request_menu_item(session)?;
        let locale = self.request_manager.request_display_locale(session)?;
        let ctx = DisplayContext::new(session);
        let html = HtmlBuilder::from_menu_page(&self.request_manager, selected, &locale, &ctx).build();
        Ok((html, locale.to_language_tag()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MenuEntry, MenuEntryKind};

    fn entry(id: &str, requires: Option<&str>) -> MenuEntry {
        MenuEntry {
            id: id.to_string(),
            parent: None,
            kind: MenuEntryKind::Page,
            title: id.to_uppercase(),
            url: None,
            requires_attribute: requires.map(str::to_string),
        }
    }

    fn app() -> WebApplication {
        let config = Config::new()
            .with_locales(&["de_AT", "en_US"], Some("en_US"))
            .with_menu(
                vec![entry("home", None), entry("about", None), entry("admin", Some("admin"))],
                &["home"],
            );
        WebApplication::from_config(&config).unwrap()
    }

    fn request(raw: &str) -> Request {
        Request::try_from(raw.as_bytes(), 0).unwrap()
    }

    fn text(response: &Response) -> String {
        String::from_utf8_lossy(&response.as_bytes()).into_owned()
    }

    #[test]
    fn test_options() {
        let response = app().handle(&request("OPTIONS * HTTP/1.1\r\n\r\n"), 1);
        assert_eq!(response.status_code(), 204);
        assert!(text(&response).contains("Allow: GET, HEAD, OPTIONS, POST"));
    }

    #[test]
    fn test_default_page_without_session() {
        let app = app();
        let response = app.handle(&request("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"), 1);
        let body = text(&response);
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.content_language(), Some("en-US"));
        assert!(response.cookie().is_none());
        assert!(body.contains(r#"<p id="menuitem">home</p>"#));
        assert_eq!(app.session_store().session_count(), 0);
    }

    #[test]
    fn test_session_cookie_round_trip() {
        let app = app();
        let first = app.handle(
            &request("GET /?menuitem=about&locale=de_AT HTTP/1.1\r\nHost: localhost\r\n\r\n"),
            1,
        );
        let cookie = first.cookie().unwrap().to_string();
        assert!(cookie.starts_with("SESSIONID="));
        assert!(cookie.ends_with("; Path=/; HttpOnly"));
        let pair = cookie.split(';').next().unwrap();

        let second = app.handle(
            &request(&format!("GET / HTTP/1.1\r\nHost: localhost\r\nCookie: {}\r\n\r\n", pair)),
            2,
        );
        assert!(second.cookie().is_none());
        assert_eq!(second.content_language(), Some("de-AT"));
        assert!(text(&second).contains(r#"<p id="menuitem">about</p>"#));
    }

    #[test]
    fn test_display_locale_ignores_accept_language() {
        let response = app().handle(
            &request("GET / HTTP/1.1\r\nHost: localhost\r\nAccept-Language: de-AT\r\n\r\n"),
            1,
        );
        let raw = text(&response);
        assert_eq!(response.content_language(), Some("en-US"));
        assert!(raw.contains("Vary: Accept-Encoding, Cookie\r\n"));
        assert!(!raw.contains("Accept-Language"));
    }

    #[test]
    fn test_head_has_no_body() {
        let response = app().handle(&request("HEAD / HTTP/1.1\r\nHost: localhost\r\n\r\n"), 1);
        let raw = text(&response);
        assert_eq!(response.status_code(), 200);
        assert!(raw.ends_with("\r\n\r\n"));
        assert!(!raw.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_missing_default_locale_is_internal_error() {
        let config = Config::new().with_menu(vec![entry("home", None)], &[]);
        let app = WebApplication::from_config(&config).unwrap();
        let response = app.handle(&request("GET / HTTP/1.1\r\n\r\n"), 1);
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_empty_menu_is_internal_error() {
        let config = Config::new().with_locales(&["en_US"], Some("en_US"));
        let app = WebApplication::from_config(&config).unwrap();
        let response = app.handle(&request("GET / HTTP/1.1\r\n\r\n"), 1);
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let config = Config::new().with_locales(&["not a locale"], None);
        assert!(matches!(
            WebApplication::from_config(&config),
            Err(Exception::InvalidLocale(_))
        ));
    }
}

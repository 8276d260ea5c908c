// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use core::str;
use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::exception::Exception;
use crate::param::{REQUEST_PARAMETER_DISPLAY_LOCALE, REQUEST_PARAMETER_MENUITEM, SESSION_COOKIE_NAME};
use crate::session::DEFAULT_SESSION_CAPACITY;

/// 菜单对象的种类
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MenuEntryKind {
    #[default]
    Page,
    External,
    Separator,
}

/// 配置文件中 `[[menu]]` 的一项，父菜单必须出现在子菜单之前
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub kind: MenuEntryKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    /// 仅当会话中存在该属性时才显示
    #[serde(default)]
    pub requires_attribute: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_application_id")]
    application_id: String,
    #[serde(default = "default_menu_item_parameter")]
    menu_item_parameter: String,
    #[serde(default = "default_locale_parameter")]
    locale_parameter: String,
    #[serde(default = "default_session_cookie")]
    session_cookie: String,
    #[serde(default = "default_session_capacity")]
    session_capacity: usize,
    #[serde(default = "default_max_request_size")]
    max_request_size: u64,
    #[serde(default)]
    parse_json_body: bool,
    #[serde(default)]
    default_locale: Option<String>,
    #[serde(default)]
    supported_locales: Vec<String>,
    #[serde(default)]
    default_menu_items: Vec<String>,
    #[serde(default)]
    menu: Vec<MenuEntry>,
}

fn default_application_id() -> String {
    "webscopes".to_string()
}

fn default_menu_item_parameter() -> String {
    REQUEST_PARAMETER_MENUITEM.to_string()
}

fn default_locale_parameter() -> String {
    REQUEST_PARAMETER_DISPLAY_LOCALE.to_string()
}

fn default_session_cookie() -> String {
    SESSION_COOKIE_NAME.to_string()
}

fn default_session_capacity() -> usize {
    DEFAULT_SESSION_CAPACITY
}

fn default_max_request_size() -> u64 {
    5 * 1024 * 1024 * 1024 // 5GB
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 7878,
            worker_threads: 0,
            local: true,
            application_id: default_application_id(),
            menu_item_parameter: default_menu_item_parameter(),
            locale_parameter: default_locale_parameter(),
            session_cookie: default_session_cookie(),
            session_capacity: default_session_capacity(),
            max_request_size: default_max_request_size(),
            parse_json_body: false,
            default_locale: None,
            supported_locales: Vec::new(),
            default_menu_items: Vec::new(),
            menu: Vec::new(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => {
                error!("无法打开配置文件{}: {}", filename, e);
                return Err(Exception::ConfigNotReadable(filename.to_string()));
            }
        };
        let mut str_val = String::new();
        if let Err(e) = file.read_to_string(&mut str_val) {
            error!("读取配置文件{}失败: {}", filename, e);
            return Err(Exception::ConfigNotReadable(filename.to_string()));
        }
        Ok(Self::from_toml_str(&str_val))
    }

    pub fn from_toml_str(content: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置: {}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.session_capacity == 0 {
            warn!(
                "session_capacity被设置为0，但目前尚不支持禁用会话，因此该值将被改为{}。",
                DEFAULT_SESSION_CAPACITY
            );
            raw_config.session_capacity = DEFAULT_SESSION_CAPACITY;
        }
        raw_config
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_locales(mut self, supported: &[&str], default_locale: Option<&str>) -> Self {
        self.supported_locales = supported.iter().map(|s| s.to_string()).collect();
        self.default_locale = default_locale.map(str::to_string);
        self
    }

    pub fn with_menu(mut self, menu: Vec<MenuEntry>, default_menu_items: &[&str]) -> Self {
        self.menu = menu;
        self.default_menu_items = default_menu_items.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_parse_json_body(mut self, enabled: bool) -> Self {
        self.parse_json_body = enabled;
        self
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn menu_item_parameter(&self) -> &str {
        &self.menu_item_parameter
    }

    pub fn locale_parameter(&self) -> &str {
        &self.locale_parameter
    }

    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    pub fn session_capacity(&self) -> usize {
        self.session_capacity
    }

    pub fn max_request_size(&self) -> u64 {
        self.max_request_size
    }

    pub fn parse_json_body(&self) -> bool {
        self.parse_json_body
    }

    pub fn default_locale(&self) -> Option<&str> {
        self.default_locale.as_deref()
    }

    pub fn supported_locales(&self) -> &[String] {
        &self.supported_locales
    }

    pub fn default_menu_items(&self) -> &[String] {
        &self.default_menu_items
    }

    pub fn menu(&self) -> &[MenuEntry] {
        &self.menu
    }
}

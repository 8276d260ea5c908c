// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析、multipart/JSON 请求体解析、配置加载、菜单树构建以及
//!   菜单项/显示语言解析失败等情况。
//! - **语义映射**：每个变体都对应特定的业务逻辑，便于上层模块将其转化为对应的 HTTP 状态码。
//! - **致命错误**：`NoMenuItemPresent` 与 `NoDefaultLocale` 表示不可恢复的配置错误，
//!   HTTP 层会将其转换为 `500 Internal Server Error`。

use std::fmt;

/// 处理请求或构建应用上下文时发生的异常类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求行或标头格式不正确。
    MalformedRequest,
    /// 请求体超过了配置的最大长度。对应 `413 Content Too Large`。
    RequestTooLarge,
    /// multipart/form-data 请求体无法解析，附带原因。
    MultipartParseFailed(String),
    /// JSON 请求体不是合法的 JSON 对象。
    JsonBodyInvalid(String),
    /// 配置文件无法读取。
    ConfigNotReadable(String),
    /// 配置内容不合法（例如菜单项引用了不存在的父节点）。
    ConfigInvalid(String),
    /// 菜单树中找不到指定 ID 的菜单项。
    MenuItemNotFound(String),
    /// 菜单树中已存在相同 ID 的菜单项。
    DuplicateMenuItemId(String),
    /// 无法解析的语言区域标识。
    InvalidLocale(String),
    /// 菜单树中没有任何可显示的页面菜单项。
    NoMenuItemPresent,
    /// 没有配置应用程序默认显示语言。
    NoDefaultLocale,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            MalformedRequest => write!(f, "Malformed request"),
            RequestTooLarge => write!(f, "Request body too large (413)"),
            MultipartParseFailed(reason) => {
                write!(f, "Error parsing multipart request content: {}", reason)
            }
            JsonBodyInvalid(reason) => write!(f, "Error parsing JSON request body: {}", reason),
            ConfigNotReadable(reason) => write!(f, "Couldn't read configuration: {}", reason),
            ConfigInvalid(reason) => write!(f, "Invalid configuration: {}", reason),
            MenuItemNotFound(id) => write!(f, "No such menu item '{}'", id),
            DuplicateMenuItemId(id) => write!(f, "Menu item ID '{}' is already contained", id),
            InvalidLocale(tag) => write!(f, "Invalid locale '{}'", tag),
            NoMenuItemPresent => write!(f, "No menu item is present!"),
            NoDefaultLocale => write!(f, "No application default locale is specified!"),
        }
    }
}

impl std::error::Error for Exception {}

impl Exception {
    /// 异常对应的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest | UnsupportedHttpVersion => 400,
            MultipartParseFailed(_) | JsonBodyInvalid(_) | InvalidLocale(_) => 400,
            UnSupportedRequestMethod => 405,
            RequestTooLarge => 413,
            MenuItemNotFound(_) => 404,
            ConfigNotReadable(_) | ConfigInvalid(_) | DuplicateMenuItemId(_) => 500,
            NoMenuItemPresent | NoDefaultLocale => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_map_to_500() {
        assert_eq!(NoMenuItemPresent.status_code(), 500);
        assert_eq!(NoDefaultLocale.status_code(), 500);
    }

    #[test]
    fn test_display_contains_context() {
        let e = MenuItemNotFound("settings".to_string());
        assert_eq!(e.to_string(), "No such menu item 'settings'");
        assert_eq!(RequestTooLarge.status_code(), 413);
    }
}

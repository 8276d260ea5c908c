// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求管理器
//!
//! 每个请求开始时，`RequestManager` 检查菜单项参数和显示语言参数，
//! 把合法的值写入会话；之后的请求即使不带参数，也会沿用会话中保存的选择。
//!
//! 菜单项的读取顺序：会话中的菜单项（仍然可见时）、默认菜单项（可见时）、
//! 第一个可见的根页面。全部落空说明菜单配置有误。

use std::sync::Arc;

use log::{debug, error};

use crate::config::Config;
use crate::exception::Exception;
use crate::locale::{Locale, LocaleManager};
use crate::menu::{DisplayContext, MenuItemPage, MenuObject, MenuTree};
use crate::param::{REQUEST_PARAMETER_DISPLAY_LOCALE, REQUEST_PARAMETER_MENUITEM};
use crate::request_scope::RequestWebScope;
use crate::scope::AttributeValue;
use crate::session::SessionHandle;

const SESSION_VALUE_SUFFIX_MENUITEM: &str = "$menuitem";
const SESSION_VALUE_SUFFIX_DISPLAY_LOCALE: &str = "$displaylocale";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestManagerSettings {
    pub application_id: String,
    pub menu_item_parameter: String,
    pub locale_parameter: String,
}

impl Default for RequestManagerSettings {
    fn default() -> Self {
        Self {
            application_id: "webscopes".to_string(),
            menu_item_parameter: REQUEST_PARAMETER_MENUITEM.to_string(),
            locale_parameter: REQUEST_PARAMETER_DISPLAY_LOCALE.to_string(),
        }
    }
}

impl RequestManagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            application_id: config.application_id().to_string(),
            menu_item_parameter: config.menu_item_parameter().to_string(),
            locale_parameter: config.locale_parameter().to_string(),
        }
    }
}

pub struct RequestManager {
    menu_tree: Arc<MenuTree>,
    locale_manager: Arc<LocaleManager>,
    settings: RequestManagerSettings,
    session_key_menu_item: String,
    session_key_display_locale: String,
}

impl RequestManager {
    pub fn new(
        menu_tree: Arc<MenuTree>,
        locale_manager: Arc<LocaleManager>,
        settings: RequestManagerSettings,
    ) -> Self {
        let session_key_menu_item =
            format!("{}{}", settings.application_id, SESSION_VALUE_SUFFIX_MENUITEM);
        let session_key_display_locale = format!(
            "{}{}",
            settings.application_id, SESSION_VALUE_SUFFIX_DISPLAY_LOCALE
        );
        Self {
            menu_tree,
            locale_manager,
            settings,
            session_key_menu_item,
            session_key_display_locale,
        }
    }

    pub fn menu_tree(&self) -> &MenuTree {
        &self.menu_tree
    }

    pub fn locale_manager(&self) -> &LocaleManager {
        &self.locale_manager
    }

    pub fn settings(&self) -> &RequestManagerSettings {
        &self.settings
    }

    /// 会话中保存菜单项 ID 的属性名
    pub fn session_key_menu_item(&self) -> &str {
        &self.session_key_menu_item
    }

    /// 会话中保存显示语言的属性名
    pub fn session_key_display_locale(&self) -> &str {
        &self.session_key_display_locale
    }

    /// 处理请求参数中的菜单项与显示语言；不合法的值被静默忽略。
    pub fn on_request_begin(&self, scope: &RequestWebScope<'_>, session: &mut SessionHandle<'_>) {
        let id = scope.id();

        if let Some(menu_item_id) = scope.attribute_as_string(&self.settings.menu_item_parameter) {
            let accepted = match self.menu_tree.menu_item_of_id(&menu_item_id) {
                Some(page) => page.matches_display_filter(&DisplayContext::new(session)),
                None => false,
            };
            if accepted {
                session.set_attribute(
                    &self.session_key_menu_item,
                    AttributeValue::MenuItem(menu_item_id.clone()),
                );
                debug!("[ID{}]会话菜单项设置为{}", id, menu_item_id);
            } else {
                debug!("[ID{}]忽略菜单项参数{}", id, menu_item_id);
            }
        }

        if let Some(tag) = scope.attribute_as_string(&self.settings.locale_parameter) {
            match Locale::parse(&tag) {
                Ok(locale) if self.locale_manager.is_supported_locale(&locale) => {
                    debug!("[ID{}]会话显示语言设置为{}", id, locale);
                    session.set_attribute(
                        &self.session_key_display_locale,
                        AttributeValue::Locale(locale),
                    );
                }
                _ => debug!("[ID{}]忽略显示语言参数{}", id, tag),
            }
        }
    }

    /// 会话中保存的菜单项，不检查显示过滤器
    pub fn session_menu_item(&self, session: &SessionHandle<'_>) -> Option<&MenuItemPage> {
        match session.get_attribute(&self.session_key_menu_item)? {
            AttributeValue::MenuItem(menu_item_id) => self.menu_tree.menu_item_of_id(&menu_item_id),
            _ => None,
        }
    }

    pub fn default_menu_item(&self) -> Option<&MenuItemPage> {
        self.menu_tree.default_menu_item()
    }

    pub fn request_menu_item(&self, session: &SessionHandle<'_>) -> Result<&MenuItemPage, Exception> {
        let ctx = DisplayContext::new(session);

        if let Some(page) = self.session_menu_item(session) {
            if page.matches_display_filter(&ctx) {
                return Ok(page);
            }
        }

        if let Some(page) = self.default_menu_item() {
            if page.matches_display_filter(&ctx) {
                return Ok(page);
            }
        }

        let first_root = self
            .menu_tree
            .root_children()
            .into_iter()
            .filter_map(MenuObject::as_page)
            .find(|page| page.matches_display_filter(&ctx));
        match first_root {
            Some(page) => Ok(page),
            None => {
                error!("菜单树中没有任何可显示的页面");
                Err(Exception::NoMenuItemPresent)
            }
        }
    }

    pub fn request_menu_item_id(&self, session: &SessionHandle<'_>) -> Result<&str, Exception> {
        self.request_menu_item(session).map(MenuItemPage::id)
    }

    pub fn request_display_locale(&self, session: &SessionHandle<'_>) -> Result<Locale, Exception> {
        if let Some(AttributeValue::Locale(locale)) =
            session.get_attribute(&self.session_key_display_locale)
        {
            return Ok(locale);
        }
        match self.locale_manager.default_locale() {
            Some(locale) => Ok(locale.clone()),
            None => {
                error!("没有配置应用的默认显示语言");
                Err(Exception::NoDefaultLocale)
            }
        }
    }

    /// 显示语言中的国家部分
    pub fn request_display_country(
        &self,
        session: &SessionHandle<'_>,
    ) -> Result<Option<Locale>, Exception> {
        Ok(self.request_display_locale(session)?.country_locale())
    }
}

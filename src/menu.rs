// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 菜单树
//!
//! 菜单树登记应用中所有可导航的对象：页面、外部链接以及分隔符。每个对象拥有全局
//! 唯一的 ID，可以附带一个显示过滤器，决定当前会话能否看到它。
//!
//! 树使用扁平的节点数组存储，父子关系通过下标维护，ID 到下标的映射用于快速查找。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::config::{MenuEntry, MenuEntryKind};
use crate::exception::Exception;
use crate::session::SessionHandle;

/// 显示过滤器求值时可见的上下文
pub struct DisplayContext<'a> {
    session: Option<&'a SessionHandle<'a>>,
}

impl<'a> DisplayContext<'a> {
    pub fn new(session: &'a SessionHandle<'a>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// 没有会话的上下文，例如启动时的检查
    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn session_attribute(&self, name: &str) -> Option<crate::scope::AttributeValue> {
        self.session.and_then(|s| s.get_attribute(name))
    }

    pub fn has_session_attribute(&self, name: &str) -> bool {
        self.session_attribute(name).is_some()
    }
}

/// 决定某个菜单对象在当前上下文中是否可见
pub trait DisplayFilter: Send + Sync + fmt::Debug {
    fn matches(&self, ctx: &DisplayContext<'_>) -> bool;
}

/// 会话中存在指定属性（且不是 `false` 标志）时才显示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiresAttribute(pub String);

impl DisplayFilter for RequiresAttribute {
    fn matches(&self, ctx: &DisplayContext<'_>) -> bool {
        match ctx.session_attribute(&self.0) {
            Some(crate::scope::AttributeValue::Flag(b)) => b,
            Some(_) => true,
            None => false,
        }
    }
}

type FilterRef = Option<Arc<dyn DisplayFilter>>;

fn filter_matches(filter: &FilterRef, ctx: &DisplayContext<'_>) -> bool {
    filter.as_ref().map_or(true, |f| f.matches(ctx))
}

#[derive(Debug, Clone)]
pub struct MenuItemPage {
    id: String,
    title: String,
    display_filter: FilterRef,
}

impl MenuItemPage {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            display_filter: None,
        }
    }

    pub fn with_display_filter(mut self, filter: Arc<dyn DisplayFilter>) -> Self {
        self.display_filter = Some(filter);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn matches_display_filter(&self, ctx: &DisplayContext<'_>) -> bool {
        filter_matches(&self.display_filter, ctx)
    }
}

/// 指向应用外部地址的菜单项
#[derive(Debug, Clone)]
pub struct MenuItemExternal {
    id: String,
    title: String,
    url: String,
    display_filter: FilterRef,
}

impl MenuItemExternal {
    pub fn new(id: &str, title: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            display_filter: None,
        }
    }

    pub fn with_display_filter(mut self, filter: Arc<dyn DisplayFilter>) -> Self {
        self.display_filter = Some(filter);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone)]
pub struct MenuSeparator {
    id: String,
    display_filter: FilterRef,
}

impl MenuSeparator {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_filter: None,
        }
    }

    pub fn with_display_filter(mut self, filter: Arc<dyn DisplayFilter>) -> Self {
        self.display_filter = Some(filter);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub enum MenuObject {
    Page(MenuItemPage),
    External(MenuItemExternal),
    Separator(MenuSeparator),
}

impl MenuObject {
    pub fn id(&self) -> &str {
        match self {
            MenuObject::Page(p) => p.id(),
            MenuObject::External(e) => e.id(),
            MenuObject::Separator(s) => s.id(),
        }
    }

    /// 分隔符没有标题
    pub fn title(&self) -> Option<&str> {
        match self {
            MenuObject::Page(p) => Some(p.title()),
            MenuObject::External(e) => Some(e.title()),
            MenuObject::Separator(_) => None,
        }
    }

    fn display_filter(&self) -> &FilterRef {
        match self {
            MenuObject::Page(p) => &p.display_filter,
            MenuObject::External(e) => &e.display_filter,
            MenuObject::Separator(s) => &s.display_filter,
        }
    }

    pub fn has_display_filter(&self) -> bool {
        self.display_filter().is_some()
    }

    pub fn matches_display_filter(&self, ctx: &DisplayContext<'_>) -> bool {
        filter_matches(self.display_filter(), ctx)
    }

    pub fn as_page(&self) -> Option<&MenuItemPage> {
        match self {
            MenuObject::Page(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_page(&self) -> bool {
        self.as_page().is_some()
    }
}

#[derive(Debug, Clone)]
struct MenuNode {
    object: MenuObject,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MenuTree {
    nodes: Vec<MenuNode>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
    default_ids: Vec<String>,
}

impl MenuTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置顺序构建菜单树，父菜单必须先于子菜单出现。
    pub fn from_config(entries: &[MenuEntry], default_ids: &[String]) -> Result<Self, Exception> {
        let mut tree = Self::new();
        for entry in entries {
            let object = match entry.kind {
                MenuEntryKind::Page => {
                    let mut page = MenuItemPage::new(&entry.id, &entry.title);
                    if let Some(name) = &entry.requires_attribute {
                        page = page.with_display_filter(Arc::new(RequiresAttribute(name.clone())));
                    }
                    MenuObject::Page(page)
                }
                MenuEntryKind::External => {
                    let url = match &entry.url {
                        Some(u) => u,
                        None => {
                            return Err(Exception::ConfigInvalid(format!(
                                "external menu item '{}' has no url",
                                entry.id
                            )))
                        }
                    };
                    let mut external = MenuItemExternal::new(&entry.id, &entry.title, url);
                    if let Some(name) = &entry.requires_attribute {
                        external =
                            external.with_display_filter(Arc::new(RequiresAttribute(name.clone())));
                    }
                    MenuObject::External(external)
                }
                MenuEntryKind::Separator => {
                    let mut separator = MenuSeparator::new(&entry.id);
                    if let Some(name) = &entry.requires_attribute {
                        separator =
                            separator.with_display_filter(Arc::new(RequiresAttribute(name.clone())));
                    }
                    MenuObject::Separator(separator)
                }
            };
            match &entry.parent {
                Some(parent) => tree.add_object(parent, object)?,
                None => tree.add_root_object(object)?,
            }
        }
        tree.set_default_menu_item_ids(default_ids.to_vec());
        for id in tree.unresolved_default_menu_item_ids() {
            match tree.menu_object_of_id(id) {
                Some(_) => warn!("默认菜单项{}不是页面", id),
                None => warn!("无法解析默认菜单项{}", id),
            }
        }
        debug!("菜单树构建完成，共{}个对象", tree.len());
        Ok(tree)
    }

    fn insert(&mut self, parent: Option<usize>, object: MenuObject) -> Result<(), Exception> {
        if self.index.contains_key(object.id()) {
            return Err(Exception::DuplicateMenuItemId(object.id().to_string()));
        }
        let position = self.nodes.len();
        self.index.insert(object.id().to_string(), position);
        self.nodes.push(MenuNode {
            object,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(position),
            None => self.roots.push(position),
        }
        Ok(())
    }

    fn position_of(&self, id: &str) -> Result<usize, Exception> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Exception::MenuItemNotFound(id.to_string()))
    }

    pub fn add_root_object(&mut self, object: MenuObject) -> Result<(), Exception> {
        self.insert(None, object)
    }

    pub fn add_object(&mut self, parent_id: &str, object: MenuObject) -> Result<(), Exception> {
        let parent = self.position_of(parent_id)?;
        self.insert(Some(parent), object)
    }

    pub fn create_root_item(&mut self, id: &str, title: &str) -> Result<(), Exception> {
        self.add_root_object(MenuObject::Page(MenuItemPage::new(id, title)))
    }

    pub fn create_item(&mut self, parent_id: &str, id: &str, title: &str) -> Result<(), Exception> {
        self.add_object(parent_id, MenuObject::Page(MenuItemPage::new(id, title)))
    }

    pub fn create_root_external(&mut self, id: &str, title: &str, url: &str) -> Result<(), Exception> {
        self.add_root_object(MenuObject::External(MenuItemExternal::new(id, title, url)))
    }

    pub fn create_external(
        &mut self,
        parent_id: &str,
        id: &str,
        title: &str,
        url: &str,
    ) -> Result<(), Exception> {
        self.add_object(
            parent_id,
            MenuObject::External(MenuItemExternal::new(id, title, url)),
        )
    }

    pub fn create_root_separator(&mut self, id: &str) -> Result<(), Exception> {
        self.add_root_object(MenuObject::Separator(MenuSeparator::new(id)))
    }

    pub fn create_separator(&mut self, parent_id: &str, id: &str) -> Result<(), Exception> {
        self.add_object(parent_id, MenuObject::Separator(MenuSeparator::new(id)))
    }

    /// 默认菜单项按优先级排列，第一个能解析为页面的 ID 生效
    pub fn set_default_menu_item_ids(&mut self, ids: Vec<String>) {
        self.default_ids = ids;
    }

    pub fn default_menu_item_id(&self) -> Option<&str> {
        self.default_ids.first().map(String::as_str)
    }

    pub fn default_menu_item_ids(&self) -> &[String] {
        &self.default_ids
    }

    pub fn default_menu_item(&self) -> Option<&MenuItemPage> {
        self.default_ids.iter().find_map(|id| self.menu_item_of_id(id))
    }

    /// 所有能解析为页面的默认菜单项，按配置顺序
    pub fn all_default_menu_items(&self) -> Vec<&MenuItemPage> {
        self.default_ids
            .iter()
            .filter_map(|id| self.menu_item_of_id(id))
            .collect()
    }

    /// 无法解析为页面的默认菜单项 ID
    pub fn unresolved_default_menu_item_ids(&self) -> Vec<&str> {
        self.default_ids
            .iter()
            .filter(|id| self.menu_item_of_id(id).is_none())
            .map(String::as_str)
            .collect()
    }

    pub fn menu_object_of_id(&self, id: &str) -> Option<&MenuObject> {
        self.index.get(id).map(|&i| &self.nodes[i].object)
    }

    pub fn menu_item_of_id(&self, id: &str) -> Option<&MenuItemPage> {
        self.menu_object_of_id(id).and_then(MenuObject::as_page)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn root_children(&self) -> Vec<&MenuObject> {
        self.roots.iter().map(|&i| &self.nodes[i].object).collect()
    }

    pub fn children_of(&self, id: &str) -> Vec<&MenuObject> {
        match self.index.get(id) {
            Some(&i) => self.nodes[i]
                .children
                .iter()
                .map(|&c| &self.nodes[c].object)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn parent_of(&self, id: &str) -> Option<&MenuObject> {
        let i = *self.index.get(id)?;
        self.nodes[i].parent.map(|p| &self.nodes[p].object)
    }

    /// `child_id` 是否为 `parent_id` 本身或其后代
    pub fn is_item_same_or_descendant(&self, parent_id: &str, child_id: &str) -> bool {
        let (parent, mut current) = match (self.index.get(parent_id), self.index.get(child_id)) {
            (Some(&p), Some(&c)) => (p, Some(c)),
            _ => return false,
        };
        while let Some(i) = current {
            if i == parent {
                return true;
            }
            current = self.nodes[i].parent;
        }
        false
    }

    /// 先序遍历所有菜单对象，回调的第二个参数为深度（根层为 0）
    pub fn iterate_all_menu_objects<F>(&self, mut callback: F)
    where
        F: FnMut(&MenuObject, usize),
    {
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&i| (i, 0)).collect();
        while let Some((i, depth)) = stack.pop() {
            let node = &self.nodes[i];
            callback(&node.object, depth);
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    /// 用同 ID 的新对象替换原对象，位置与子节点保持不变
    pub fn replace_menu_item(&mut self, object: MenuObject) -> Result<(), Exception> {
        let position = self.position_of(object.id())?;
        self.nodes[position].object = object;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 作用域（Scope）
//!
//! 作用域是带生命周期的命名属性容器：请求作用域随一次 HTTP 请求存在，
//! 会话作用域则在同一浏览器会话的多个请求之间保留。

use std::fmt;

use crate::locale::Locale;
use crate::multipart::FileItem;

/// 作用域中可以保存的属性值
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// 单值请求参数
    Text(String),
    /// 多值请求参数
    TextList(Vec<String>),
    /// 单个上传文件
    File(FileItem),
    /// 同名的多个上传文件
    FileList(Vec<FileItem>),
    /// JSON 请求体中的属性
    Json(serde_json::Value),
    /// 内部标志位
    Flag(bool),
    /// 选中的菜单项 ID
    MenuItem(String),
    /// 选中的显示语言
    Locale(Locale),
}

impl AttributeValue {
    /// 字符串视图：多值参数取第一个，JSON 字符串去掉引号，其余类型使用其文本形式。
    /// 文件没有字符串视图。
    pub fn as_string(&self) -> Option<String> {
        match self {
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::TextList(v) => v.first().cloned(),
            AttributeValue::Json(serde_json::Value::String(s)) => Some(s.clone()),
            AttributeValue::Json(serde_json::Value::Null) => None,
            AttributeValue::Json(v) => Some(v.to_string()),
            AttributeValue::Flag(b) => Some(b.to_string()),
            AttributeValue::MenuItem(id) => Some(id.clone()),
            AttributeValue::Locale(l) => Some(l.to_string()),
            AttributeValue::File(_) | AttributeValue::FileList(_) => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

/// 修改操作是否真正改变了状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Changed,
    Unchanged,
}

impl Change {
    pub fn is_changed(&self) -> bool {
        *self == Change::Changed
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Changed => write!(f, "CHANGED"),
            Change::Unchanged => write!(f, "UNCHANGED"),
        }
    }
}

/// 保持插入顺序的属性映射
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    id: String,
    attributes: Vec<(String, AttributeValue)>,
}

impl Scope {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|(k, _)| k == name)
    }

    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Change {
        match self.position(name) {
            Some(i) if self.attributes[i].1 == value => Change::Unchanged,
            Some(i) => {
                self.attributes[i].1 = value;
                Change::Changed
            }
            None => {
                self.attributes.push((name.to_string(), value));
                Change::Changed
            }
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.position(name).map(|i| &self.attributes[i].1)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Change {
        match self.position(name) {
            Some(i) => {
                self.attributes.remove(i);
                Change::Changed
            }
            None => Change::Unchanged,
        }
    }

    pub fn contains_attribute(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn attribute_as_string(&self, name: &str) -> Option<String> {
        self.get_attribute(name).and_then(AttributeValue::as_string)
    }

    /// `Flag` 直接返回，文本值按 `true`/`false` 解析
    pub fn attribute_as_bool(&self, name: &str) -> Option<bool> {
        match self.get_attribute(name)? {
            AttributeValue::Flag(b) => Some(*b),
            AttributeValue::Json(serde_json::Value::Bool(b)) => Some(*b),
            other => other.as_string()?.trim().parse().ok(),
        }
    }

    /// 设置标志位并返回其先前状态
    pub fn get_and_set_flag(&mut self, name: &str) -> bool {
        let previous = self.attribute_as_bool(name).unwrap_or(false);
        self.set_attribute(name, AttributeValue::Flag(true));
        previous
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(k, _)| k.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
    }
}

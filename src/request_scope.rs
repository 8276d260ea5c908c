// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求作用域
//!
//! `RequestWebScope` 把一次 HTTP 请求包装成属性容器。`init_scope` 负责把请求参数、
//! multipart 上传内容以及（可选的）JSON 请求体写入作用域，且只执行一次：
//! 请求体只能被消费一次，重复初始化会丢失数据。

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, warn};

use crate::multipart::{is_multipart_content, parse_multipart, FileItem};
use crate::request::Request;
use crate::scope::{AttributeValue, Scope};

/// 作用域是否已初始化的标志属性
pub const REQUEST_ATTR_SCOPE_INITED: &str = "$request.scope.inited";
/// JSON 请求体已解析的标志属性
pub const REQUEST_ATTR_JSON_BODY_PARSED: &str = "$request.scope.jsonbody.parsed";
/// 默认的最大请求体大小（5GB）
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 5 * 1024 * 1024 * 1024;

static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct RequestWebScope<'r> {
    request: &'r Request,
    id: u128,
    scope: Scope,
    multipart: bool,
    json_body: bool,
    max_request_size: u64,
}

impl<'r> RequestWebScope<'r> {
    /// 支持 multipart 上传的请求作用域
    pub fn new(request: &'r Request, id: u128) -> Self {
        let n = SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            request,
            id,
            scope: Scope::new(&format!("{}@{}", n, request.path())),
            multipart: true,
            json_body: false,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }

    /// 不解析 multipart 请求体的请求作用域
    pub fn without_multipart(request: &'r Request, id: u128) -> Self {
        let mut scope = Self::new(request, id);
        scope.multipart = false;
        scope
    }

    pub fn with_json_body(mut self, enabled: bool) -> Self {
        self.json_body = enabled;
        self
    }

    pub fn with_max_request_size(mut self, max_request_size: u64) -> Self {
        self.max_request_size = max_request_size;
        self
    }

    pub fn init_scope(&mut self) {
        if self.scope.get_and_set_flag(REQUEST_ATTR_SCOPE_INITED) {
            warn!(
                "[ID{}]请求作用域{}已经初始化过，忽略本次调用",
                self.id,
                self.scope.id()
            );
            return;
        }

        let added_special = self.add_special_request_attributes();

        for (name, mut values) in self.request.parameters() {
            if added_special && self.scope.contains_attribute(&name) {
                continue;
            }
            let value = if values.len() == 1 {
                AttributeValue::Text(values.remove(0))
            } else {
                AttributeValue::TextList(values)
            };
            self.scope.set_attribute(&name, value);
        }

        if self.json_body {
            self.add_json_body_attributes();
        }
        debug!(
            "[ID{}]请求作用域{}初始化完成，共{}个属性",
            self.id,
            self.scope.id(),
            self.scope.len()
        );
    }

    /// multipart 请求：表单字段按 UTF-8 解码为文本，上传文件直接保存。
    /// 返回是否写入了任何属性。
    fn add_special_request_attributes(&mut self) -> bool {
        if !self.multipart || !is_multipart_content(self.request.content_type()) {
            return false;
        }
        let content_type = self.request.content_type().unwrap_or_default();
        let items = match parse_multipart(content_type, self.request.body(), self.max_request_size)
        {
            Ok(items) => items,
            Err(e) => {
                error!("[ID{}]解析multipart请求体失败: {}", self.id, e);
                return false;
            }
        };

        let mut fields: Vec<(String, Vec<String>)> = Vec::new();
        let mut files: Vec<(String, Vec<FileItem>)> = Vec::new();
        for item in items {
            let name = item.field_name().to_string();
            if item.is_form_field() {
                let value = item.as_string();
                match fields.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, v)) => v.push(value),
                    None => fields.push((name, vec![value])),
                }
            } else {
                match files.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, v)) => v.push(item),
                    None => files.push((name, vec![item])),
                }
            }
        }

        let added = !fields.is_empty() || !files.is_empty();
        for (name, mut values) in fields {
            let value = if values.len() == 1 {
                AttributeValue::Text(values.remove(0))
            } else {
                AttributeValue::TextList(values)
            };
            self.scope.set_attribute(&name, value);
        }
        for (name, mut items) in files {
            let value = if items.len() == 1 {
                AttributeValue::File(items.remove(0))
            } else {
                AttributeValue::FileList(items)
            };
            self.scope.set_attribute(&name, value);
        }
        added
    }

    fn add_json_body_attributes(&mut self) {
        let is_json = self
            .request
            .content_type()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .map_or(false, |m| m.essence_str() == mime::APPLICATION_JSON.essence_str());
        if !is_json || self.request.body().is_empty() {
            return;
        }
        match serde_json::from_slice::<serde_json::Value>(self.request.body()) {
            Ok(serde_json::Value::Object(map)) => {
                for (name, value) in map {
                    self.scope.set_attribute(&name, AttributeValue::Json(value));
                }
                self.scope
                    .set_attribute(REQUEST_ATTR_JSON_BODY_PARSED, AttributeValue::Flag(true));
            }
            Ok(_) => warn!("[ID{}]JSON请求体不是对象，已忽略", self.id),
            Err(e) => error!("[ID{}]解析JSON请求体失败: {}", self.id, e),
        }
    }
}

impl<'r> RequestWebScope<'r> {
    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.scope
            .attribute_as_bool(REQUEST_ATTR_SCOPE_INITED)
            .unwrap_or(false)
    }

    pub fn is_json_body_parsed(&self) -> bool {
        self.scope
            .attribute_as_bool(REQUEST_ATTR_JSON_BODY_PARSED)
            .unwrap_or(false)
    }

    pub fn attribute_as_string(&self, name: &str) -> Option<String> {
        self.scope.attribute_as_string(name)
    }

    /// 文本属性的全部值，文件属性返回 `None`
    pub fn attribute_values(&self, name: &str) -> Option<Vec<String>> {
        match self.scope.get_attribute(name)? {
            AttributeValue::Text(s) => Some(vec![s.clone()]),
            AttributeValue::TextList(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn has_attribute_value(&self, name: &str, value: &str) -> bool {
        self.attribute_values(name)
            .map_or(false, |values| values.iter().any(|v| v == value))
    }

    pub fn attribute_as_file_item(&self, name: &str) -> Option<&FileItem> {
        match self.scope.get_attribute(name)? {
            AttributeValue::File(item) => Some(item),
            AttributeValue::FileList(items) => items.first(),
            _ => None,
        }
    }

    /// 每个文件字段的第一个上传文件
    pub fn all_uploaded_file_items(&self) -> Vec<(&str, &FileItem)> {
        let mut result = Vec::new();
        for (name, value) in self.scope.attributes() {
            match value {
                AttributeValue::File(item) => result.push((name, item)),
                AttributeValue::FileList(items) => {
                    if let Some(item) = items.first() {
                        result.push((name, item));
                    }
                }
                _ => {}
            }
        }
        result
    }

    /// 每个文件字段上传的全部文件
    pub fn all_uploaded_file_items_complete(&self) -> Vec<(&str, Vec<&FileItem>)> {
        let mut result = Vec::new();
        for (name, value) in self.scope.attributes() {
            match value {
                AttributeValue::File(item) => result.push((name, vec![item])),
                AttributeValue::FileList(items) => result.push((name, items.iter().collect())),
                _ => {}
            }
        }
        result
    }

    pub fn all_uploaded_file_item_values(&self) -> Vec<&FileItem> {
        self.all_uploaded_file_items_complete()
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect()
    }
}

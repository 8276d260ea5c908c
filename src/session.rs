// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话存储
//!
//! 会话作用域在同一浏览器的多个请求之间保存属性（选中的菜单项、显示语言等）。
//! 存储实现通过 `SessionStore` trait 注入，默认的 `MemorySessionStore`
//! 使用容量受限的 LRU 结构，最久未访问的会话会被淘汰。
//!
//! `SessionHandle` 是单个请求对会话的视图：只有第一次写入时才会真正创建会话。

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use lru::LruCache;
use uuid::Uuid;

use crate::scope::{AttributeValue, Change, Scope};

/// 容量配置为 0 时使用的会话数上限
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;

/// 可插拔的会话存储后端
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// 创建一个新会话并返回其 ID
    fn create_session(&self) -> String;

    /// 会话存在时同时刷新其访问时间
    fn contains_session(&self, session_id: &str) -> bool;

    fn get_attribute(&self, session_id: &str, name: &str) -> Option<AttributeValue>;

    /// 会话不存在时不做任何修改并返回 `None`
    fn set_attribute(&self, session_id: &str, name: &str, value: AttributeValue)
        -> Option<Change>;

    fn remove_attribute(&self, session_id: &str, name: &str) -> Change;

    /// 销毁会话，返回会话此前是否存在
    fn invalidate(&self, session_id: &str) -> bool;

    fn session_count(&self) -> usize;
}

/// 一个会话的属性容器及其时间戳
#[derive(Debug, Clone)]
pub struct SessionScope {
    scope: Scope,
    created: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

impl SessionScope {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            scope: Scope::new(id),
            created: now,
            last_accessed: now,
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed
    }
}

pub struct MemorySessionStore {
    sessions: Mutex<LruCache<String, SessionScope>>,
}

impl MemorySessionStore {
    // 根据容量构造
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = match NonZeroUsize::new(capacity) {
            Some(c) => c,
            None => {
                warn!(
                    "会话容量被设置为0，将使用默认值{}",
                    DEFAULT_SESSION_CAPACITY
                );
                NonZeroUsize::new(DEFAULT_SESSION_CAPACITY).unwrap_or(NonZeroUsize::MIN)
            }
        };
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, SessionScope>> {
        match self.sessions.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("会话锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    /// 会话的快照（不更新访问顺序）
    pub fn session(&self, session_id: &str) -> Option<SessionScope> {
        self.lock().peek(session_id).cloned()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::from_capacity(DEFAULT_SESSION_CAPACITY)
    }
}

impl SessionStore for MemorySessionStore {
    fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.lock();
        if let Some((evicted, _)) = sessions.push(id.clone(), SessionScope::new(&id)) {
            debug!("会话{}因容量限制被淘汰", evicted);
        }
        debug!("创建会话{}", id);
        id
    }

    fn contains_session(&self, session_id: &str) -> bool {
        match self.lock().get_mut(session_id) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    fn get_attribute(&self, session_id: &str, name: &str) -> Option<AttributeValue> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(session_id)?;
        session.touch();
        session.scope.get_attribute(name).cloned()
    }

    fn set_attribute(
        &self,
        session_id: &str,
        name: &str,
        value: AttributeValue,
    ) -> Option<Change> {
        let mut sessions = self.lock();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.touch();
                Some(session.scope.set_attribute(name, value))
            }
            None => {
                warn!("会话{}不存在，忽略属性{}", session_id, name);
                None
            }
        }
    }

    fn remove_attribute(&self, session_id: &str, name: &str) -> Change {
        match self.lock().get_mut(session_id) {
            Some(session) => session.scope.remove_attribute(name),
            None => Change::Unchanged,
        }
    }

    fn invalidate(&self, session_id: &str) -> bool {
        let removed = self.lock().pop(session_id).is_some();
        if removed {
            debug!("会话{}已销毁", session_id);
        }
        removed
    }

    fn session_count(&self) -> usize {
        self.lock().len()
    }
}

/// 单个请求对会话的视图，会话在第一次写入时才被创建
pub struct SessionHandle<'a> {
    store: &'a dyn SessionStore,
    id: Option<String>,
    created: bool,
}

impl<'a> SessionHandle<'a> {
    /// 使用请求 Cookie 中的会话 ID 打开会话；ID 缺失或已失效时暂不创建。
    pub fn open(store: &'a dyn SessionStore, session_id: Option<&str>) -> Self {
        let id = match session_id {
            Some(id) if store.contains_session(id) => Some(id.to_string()),
            Some(id) => {
                debug!("会话{}不存在或已过期", id);
                None
            }
            None => None,
        };
        Self {
            store,
            id,
            created: false,
        }
    }

    /// 当前会话 ID，尚未创建会话时为 `None`
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// 会话是否在本次请求中新建
    pub fn is_new(&self) -> bool {
        self.created
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub fn get_attribute(&self, name: &str) -> Option<AttributeValue> {
        let id = self.id.as_deref()?;
        self.store.get_attribute(id, name)
    }

    pub fn contains_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    fn ensure_session(&mut self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => {
                let id = self.store.create_session();
                self.id = Some(id.clone());
                self.created = true;
                id
            }
        }
    }

    /// 打开后会话若已被淘汰，则新建一个会话再写入，调用方据 `is_new` 下发新的 Cookie。
    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Change {
        let id = self.ensure_session();
        if let Some(change) = self.store.set_attribute(&id, name, value.clone()) {
            return change;
        }
        warn!("会话{}已失效，重新创建会话", id);
        self.id = None;
        let id = self.ensure_session();
        self.store
            .set_attribute(&id, name, value)
            .unwrap_or(Change::Unchanged)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Change {
        match self.id.as_deref() {
            Some(id) => self.store.remove_attribute(id, name),
            None => Change::Unchanged,
        }
    }

    pub fn invalidate(&mut self) {
        if let Some(id) = self.id.take() {
            self.store.invalidate(&id);
        }
        self.created = false;
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod accept;
pub mod app;
pub mod config;
pub mod exception;
pub mod locale;
pub mod menu;
pub mod multipart;
pub mod param;
pub mod qvalue;
pub mod request;
pub mod request_manager;
pub mod request_scope;
pub mod response;
pub mod scope;
pub mod server;
pub mod session;
pub mod util;

pub use accept::{AcceptCharsetList, AcceptEncodingList, AcceptLanguageList, QValueList};
pub use app::WebApplication;
pub use config::Config;
pub use exception::Exception;
pub use locale::{Locale, LocaleManager};
pub use menu::{DisplayContext, DisplayFilter, MenuObject, MenuTree};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use qvalue::QValue;
pub use request::Request;
pub use request_manager::RequestManager;
pub use request_scope::RequestWebScope;
pub use response::Response;
pub use scope::{AttributeValue, Change, Scope};
pub use server::{serve, ServerState};
pub use session::{MemorySessionStore, SessionHandle, SessionStore};
pub use util::HtmlBuilder;

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{
    accept::AcceptEncodingList,
    param::*,
    util::HtmlBuilder,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};

use std::{
    io::{self, Write},
    str,
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_language: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    vary: Option<String>,
    set_cookie: Option<String>,
    content: Option<Bytes>,
    headonly: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_language: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            vary: None,
            set_cookie: None,
            content: None,
            headonly: false,
        }
    }

    /// OPTIONS 请求的应答：204 并列出允许的方法
    pub fn options(id: u128) -> Self {
        debug!("[ID{}]请求方法为OPTIONS", id);
        let mut response = Self::new();
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response.set_code(204).set_date().to_owned()
    }

    /// 错误页面，按 `Accept-Encoding` 协商压缩方式
    pub fn from_status_code(code: u16, accept_encoding: &AcceptEncodingList, id: u128) -> Self {
        let content = match code {
            400 => HtmlBuilder::from_status_code(400, Some(
                r"<h2>噢！</h2><p>服务器无法理解你的请求。</p>"
            )),
            404 => HtmlBuilder::from_status_code(404, Some(
                r"<h2>噢！</h2><p>你指定的菜单项无法找到。</p>"
            )),
            405 => HtmlBuilder::from_status_code(405, Some(
                r"<h2>噢！</h2><p>本服务器仅支持GET、HEAD、OPTIONS与POST方法。</p>"
            )),
            413 => HtmlBuilder::from_status_code(413, Some(
                r"<h2>噢！</h2><p>请求体超过了服务器允许的大小。</p>"
            )),
            500 => HtmlBuilder::from_status_code(500, Some(
                r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"
            )),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        let mut response = Self::from_html(&content, accept_encoding, id);
        if code == 405 {
            response.allow = Some(ALLOWED_METHODS.to_vec());
        }
        response.set_code(code).set_date().to_owned()
    }

    /// 不依赖请求内容的错误响应（不压缩），用于请求无法读取或解析的情况
    pub fn without_request(code: u16, id: u128) -> Self {
        Self::from_status_code(code, &AcceptEncodingList::from_header(None), id)
    }

    pub fn from_html(html: &str, accept_encoding: &AcceptEncodingList, id: u128) -> Response {
        let mut response = Self::new();
        response.content_encoding = accept_encoding.preferred_encoding(&HttpEncoding::ALL);
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        debug!("[ID{}]开始压缩HTML，原始大小: {} bytes", id, html.len());
        let content_compressed = match compress(Vec::from(html), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩HTML失败: {}，返回未压缩内容", id, e);
                response.content_encoding = None;
                Vec::from(html)
            }
        };
        response.content_length = content_compressed.len() as u64;
        response.content_type = Some(CONTENT_TYPE_HTML.to_string());
        response.content = Some(Bytes::from(content_compressed));
        response.vary = Some("Accept-Encoding".to_string());
        response
    }

    pub fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn set_content_language(&mut self, language: &str) -> &mut Self {
        self.content_language = Some(language.to_string());
        self
    }

    /// 追加 `Vary` 中的标头名
    pub fn add_vary(&mut self, header: &str) -> &mut Self {
        self.vary = Some(match self.vary.take() {
            Some(v) if v.split(',').any(|h| h.trim().eq_ignore_ascii_case(header)) => v,
            Some(v) => format!("{}, {}", v, header),
            None => header.to_string(),
        });
        self
    }

    pub fn set_cookie(&mut self, cookie: &str) -> &mut Self {
        self.set_cookie = Some(cookie.to_string());
        self
    }

    /// HEAD 请求：保留全部标头（包括 `Content-Length`），但不发送响应体
    pub fn set_headonly(&mut self) -> &mut Self {
        self.headonly = true;
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_0 => "HTTP/1.0",
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match &self.content_language {
                Some(l) => ["Content-Language: ", l, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-Encoding: ", e.token(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            match &self.allow {
                Some(a) => {
                    let methods: Vec<String> = a.iter().map(|m| m.to_string()).collect();
                    ["Allow: ", &methods.join(", "), CRLF].concat()
                }
                None => "".to_string(),
            }
            .as_str(),
            match &self.vary {
                Some(v) => ["Vary: ", v, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match &self.set_cookie {
                Some(c) => ["Set-Cookie: ", c, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            CRLF,
        ]
        .concat();
        let body: &[u8] = match &self.content {
            Some(c) if !self.headonly => c,
            _ => b"",
        };
        [header.as_bytes(), body].concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn content_language(&self) -> Option<&str> {
        self.content_language.as_deref()
    }

    pub fn cookie(&self) -> Option<&str> {
        self.set_cookie.as_deref()
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn get_content_length(&self) -> u64 {
        self.content_length
    }
}

/// IMF-fixdate，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub(crate) fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        let compressed_size = compressed.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed_size as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            mode, original_size, compressed_size, ratio
        );
    }

    result
}

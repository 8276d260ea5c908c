// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # multipart/form-data 解析
//!
//! 将 multipart 请求体拆分为 `FileItem` 列表。普通表单字段没有文件名，
//! 上传的文件携带 `filename` 以及各自的 `Content-Type`。

use bytes::Bytes;
use log::debug;

use crate::exception::Exception;

/// 上传文件未声明类型时使用的 MIME
const DEFAULT_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// multipart 请求体中的一个部分
#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    content: Bytes,
}

impl FileItem {
    pub fn new(
        field_name: &str,
        file_name: Option<&str>,
        content_type: Option<&str>,
        content: Bytes,
    ) -> Self {
        Self {
            field_name: field_name.to_string(),
            file_name: file_name.map(str::to_string),
            content_type: content_type.map(str::to_string),
            content,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(DEFAULT_PART_CONTENT_TYPE)
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// 没有文件名的部分即普通表单字段
    pub fn is_form_field(&self) -> bool {
        self.file_name.is_none()
    }

    /// 始终按 UTF-8 解码，而不是依赖部分自身声明的字符集
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// 判断 `Content-Type` 是否为 multipart/form-data
pub fn is_multipart_content(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .map_or(false, |m| {
            m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA
        })
}

fn boundary_of(content_type: &str) -> Result<String, Exception> {
    let parsed: mime::Mime = content_type
        .parse()
        .map_err(|e| Exception::MultipartParseFailed(format!("{}", e)))?;
    match parsed.get_param(mime::BOUNDARY) {
        Some(b) if !b.as_str().is_empty() => Ok(b.as_str().to_string()),
        _ => Err(Exception::MultipartParseFailed(
            "missing boundary".to_string(),
        )),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// 解析 `Content-Disposition` 中的某个参数，例如 `name="file"`
fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    for part in disposition.split(';').skip(1) {
        let part = part.trim();
        if let Some((k, v)) = part.split_once('=') {
            if k.trim().eq_ignore_ascii_case(key) {
                return Some(v.trim().trim_matches('"').to_string());
            }
        }
    }
    None
}

/// 解析 multipart/form-data 请求体，按出现顺序返回所有部分。
pub fn parse_multipart(
    content_type: &str,
    body: &[u8],
    max_size: u64,
) -> Result<Vec<FileItem>, Exception> {
    if body.len() as u64 > max_size {
        return Err(Exception::RequestTooLarge);
    }
    let boundary = boundary_of(content_type)?;
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut items = Vec::new();

    let mut pos = match find(body, &delimiter, 0) {
        Some(p) => p + delimiter.len(),
        None => {
            return Err(Exception::MultipartParseFailed(
                "boundary not found".to_string(),
            ))
        }
    };

    loop {
        // 结束分隔符 "--boundary--"
        if body[pos..].starts_with(b"--") {
            break;
        }
        if body[pos..].starts_with(b"\r\n") {
            pos += 2;
        } else {
            return Err(Exception::MultipartParseFailed(
                "malformed delimiter line".to_string(),
            ));
        }

        let header_end = match find(body, b"\r\n\r\n", pos) {
            Some(p) => p,
            None => {
                return Err(Exception::MultipartParseFailed(
                    "unterminated part headers".to_string(),
                ))
            }
        };
        let headers = String::from_utf8_lossy(&body[pos..header_end]).into_owned();
        let content_start = header_end + 4;

        let mut next_delimiter = b"\r\n".to_vec();
        next_delimiter.extend_from_slice(&delimiter);
        let content_end = match find(body, &next_delimiter, content_start) {
            Some(p) => p,
            None => {
                return Err(Exception::MultipartParseFailed(
                    "missing closing boundary".to_string(),
                ))
            }
        };

        let mut field_name = None;
        let mut file_name = None;
        let mut part_type = None;
        for line in headers.split("\r\n") {
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim().to_lowercase(), v.trim()),
                None => continue,
            };
            match name.as_str() {
                "content-disposition" => {
                    field_name = disposition_param(value, "name");
                    file_name = disposition_param(value, "filename");
                }
                "content-type" => part_type = Some(value.to_string()),
                _ => {}
            }
        }
        let field_name = match field_name {
            Some(n) => n,
            None => {
                return Err(Exception::MultipartParseFailed(
                    "part without field name".to_string(),
                ))
            }
        };

        let item = FileItem::new(
            &field_name,
            file_name.as_deref(),
            part_type.as_deref(),
            Bytes::copy_from_slice(&body[content_start..content_end]),
        );
        debug!(
            "multipart部分: name={}, filename={:?}, {} bytes",
            item.field_name(),
            item.file_name(),
            item.size()
        );
        items.push(item);

        pos = content_end + next_delimiter.len();
        if pos > body.len() {
            break;
        }
    }
    Ok(items)
}

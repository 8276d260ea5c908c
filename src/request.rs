// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询字符串、版本）。
//! 2. 全部 HTTP 标头（Headers）的提取，标头名大小写不敏感。
//! 3. 请求体的截取（遵循 `Content-Length`）。
//! 4. 查询字符串与表单请求体参数的解码（类似 Servlet 的 `getParameterValues`）。
//! 5. 内容协商相关标头（`Accept-Charset`/`Accept-Encoding`/`Accept-Language`）的解析。

use bytes::Bytes;
use log::error;
use percent_encoding::percent_decode_str;

use crate::{
    accept::{AcceptCharsetList, AcceptEncodingList, AcceptLanguageList},
    exception::Exception,
    param::*,
};

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求目标原文（包含查询字符串）
    target: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 按出现顺序保存的标头，名称已转为小写
    headers: Vec<(String, String)>,
    /// 请求体
    body: Bytes,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 以第一个空行切分标头与请求体，标头部分必须是合法的 UTF-8。
    /// 2. 解析请求行：提取方法、目标和协议版本。
    /// 3. 逐行解析标头。
    /// 4. 按 `Content-Length` 截取请求体。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head, body) = match find_header_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + 4..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        // 1. 标头部分必须是 UTF-8
        let request_string = match std::str::from_utf8(head) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = request_string.split(CRLF).collect();

        // 2. 解析请求行 (e.g., "GET /index.html?menuitem=home HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::MalformedRequest);
        }

        // 解析方法名
        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        // 解析协议版本
        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = if first_line_parts.len() == 3 {
            first_line_parts[1].to_string()
        } else {
            first_line_parts[1..first_line_parts.len() - 1].join(" ")
        };

        // 3. 迭代各行解析 Headers
        let mut headers = Vec::new();
        for line in request_lines.iter().skip(1) {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_lowercase(), value.trim().to_string()))
                }
                None => {
                    error!("[ID{}]无法解析的标头行：{}", id, line);
                    return Err(Exception::MalformedRequest);
                }
            }
        }

        let mut request = Self {
            method,
            target,
            version,
            headers,
            body: Bytes::new(),
        };

        // 4. 按 Content-Length 截取请求体
        let body_len = match request.content_length() {
            Some(len) => (len as usize).min(body.len()),
            None => body.len(),
        };
        request.body = Bytes::copy_from_slice(&body[..body_len]);

        Ok(request)
    }

    /// 解析 `application/x-www-form-urlencoded` 格式的键值对，`+` 表示空格。
    pub fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
        input
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .filter(|(key, _)| !key.is_empty())
            .collect()
    }

    /// Servlet 风格的请求参数：先是查询字符串，再是表单请求体；
    /// 同名参数合并为多值，按首次出现的顺序排列。
    pub fn parameters(&self) -> Vec<(String, Vec<String>)> {
        let mut params: Vec<(String, Vec<String>)> = Vec::new();
        let mut pairs = match self.query_string() {
            Some(q) => Self::parse_urlencoded(q),
            None => Vec::new(),
        };
        if self.is_form_urlencoded() {
            pairs.extend(Self::parse_urlencoded(&String::from_utf8_lossy(&self.body)));
        }
        for (key, value) in pairs {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => params.push((key, vec![value])),
            }
        }
        params
    }

    fn is_form_urlencoded(&self) -> bool {
        if self.method != HttpRequestMethod::Post {
            return false;
        }
        self.content_type()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .map_or(false, |m| m.essence_str() == CONTENT_TYPE_FORM_URLENCODED)
    }
}

pub(crate) fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求目标原文（含查询参数）
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 获取请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// 获取查询字符串（不含 `?`）
    pub fn query_string(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 按名称（大小写不敏感）获取第一个匹配的标头值
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 从 `Cookie` 标头中取出指定名称的值
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k == "cookie")
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim())
    }

    /// 解析后的 `Accept-Charset`
    pub fn accept_charset(&self) -> AcceptCharsetList {
        AcceptCharsetList::from_header(self.header("accept-charset"))
    }

    /// 解析后的 `Accept-Encoding`
    pub fn accept_encoding(&self) -> AcceptEncodingList {
        AcceptEncodingList::from_header(self.header("accept-encoding"))
    }

    /// 解析后的 `Accept-Language`
    pub fn accept_language(&self) -> AcceptLanguageList {
        AcceptLanguageList::from_header(self.header("accept-language"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";
        let buffer = request_str.as_bytes().to_vec();

        let request = Request::try_from(&buffer, 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert!(request.accept_encoding().supports_gzip());
        assert!(request.accept_encoding().supports_deflate());
        assert!(request.accept_encoding().supports("br"));
    }

    /// 验证 HEAD 请求的解析
    #[test]
    fn test_parse_head_request() {
        let request_str =
            "HEAD /index.html HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Agent\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Head);
        assert_eq!(request.path(), "/index.html");
    }

    /// 验证 OPTIONS 请求（常用于 CORS 预检）
    #[test]
    fn test_parse_options_request() {
        let request_str = "OPTIONS * HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Options);
        assert_eq!(request.path(), "*");
    }

    /// 验证 POST 请求体按 Content-Length 截取
    #[test]
    fn test_parse_post_request_body() {
        let request_str =
            "POST /submit HTTP/1.1\r\nHost: localhost:7878\r\nContent-Length: 10\r\n\r\ntest=valueEXTRA";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.path(), "/submit");
        assert_eq!(request.body().as_ref(), b"test=value");
    }

    /// 确保不支持的 HTTP 方法（如 DELETE）会返回错误
    #[test]
    fn test_unsupported_method() {
        let request_str = "DELETE /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);

        assert_eq!(result.unwrap_err(), Exception::UnSupportedRequestMethod);
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);

        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    /// HTTP/1.0 仍然被接受
    #[test]
    fn test_http_1_0() {
        let request = Request::try_from(b"GET / HTTP/1.0\r\n\r\n", 0).unwrap();
        assert_eq!(*request.version(), HttpVersion::V1_0);
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);

        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    /// 请求行不完整
    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET /\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequest);
    }

    /// 验证 Header 字段名是否大小写不敏感
    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost:7878\r\nuser-agent: Test\r\nACCEPT-LANGUAGE: de-AT\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.user_agent(), "Test");
        assert_eq!(request.header("Host"), Some("localhost:7878"));
        assert_eq!(request.accept_language().get_quality("de-at"), 1.0);
    }

    /// 缺失编码标头时只接受 identity
    #[test]
    fn test_no_encoding_header() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        let encodings = request.accept_encoding();
        assert_eq!(encodings.len(), 1);
        assert!(encodings.supports("identity"));
        assert!(!encodings.supports_gzip());
    }

    /// 确保带查询参数的路径能完整提取
    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /page?id=123&name=test HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.target(), "/page?id=123&name=test");
        assert_eq!(request.path(), "/page");
        assert_eq!(request.query_string(), Some("id=123&name=test"));
    }

    /// 验证请求方法的小写兼容性处理
    #[test]
    fn test_lowercase_method() {
        let request = Request::try_from(b"get / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n", 0).unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Get);
    }

    /// 查询字符串与表单参数合并，同名参数变为多值
    #[test]
    fn test_parameters_query_and_form() {
        let body = "tag=b&title=Hello+World%21";
        let request_str = format!(
            "POST /save?tag=a&menuitem=home HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded; charset=UTF-8\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        let params = request.parameters();

        assert_eq!(params[0], ("tag".to_string(), vec!["a".to_string(), "b".to_string()]));
        assert_eq!(params[1], ("menuitem".to_string(), vec!["home".to_string()]));
        assert_eq!(params[2], ("title".to_string(), vec!["Hello World!".to_string()]));
    }

    /// 非表单请求体不参与参数解析
    #[test]
    fn test_parameters_ignore_non_form_body() {
        let request_str = "POST /?a=1 HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"b\":2}";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.parameters().len(), 1);
    }

    #[test]
    fn test_parse_urlencoded_edge_cases() {
        let pairs = Request::parse_urlencoded("flag&=skip&&x=%E4%BD%A0");
        assert_eq!(
            pairs,
            vec![
                ("flag".to_string(), "".to_string()),
                ("x".to_string(), "你".to_string())
            ]
        );
    }

    #[test]
    fn test_cookie() {
        let request_str = "GET / HTTP/1.1\r\nCookie: theme=dark; SESSIONID=abc-123\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.cookie("SESSIONID"), Some("abc-123"));
        assert_eq!(request.cookie("theme"), Some("dark"));
        assert_eq!(request.cookie("missing"), None);
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容协商（Content Negotiation）
//!
//! 将 `Accept-Charset`、`Accept-Encoding`、`Accept-Language` 标头解析为按原始顺序
//! 排列的质量值列表。
//!
//! ## 解析规则
//! 1. 按 `,` 拆分并去除空白，丢弃空条目。
//! 2. 每个条目按 `;` 最多拆为两部分，第一部分为令牌。
//! 3. 若第二部分以 `q=` 开头，则将其余部分解析为浮点数；解析失败或缺省时取 1.0。
//! 4. 标头缺失或为空时，列表只包含一个默认条目（`Accept-Encoding` 为 `identity`，其余为 `*`）。
//!
//! 查询某个令牌的质量时：先精确匹配，再回退到通配符 `*`，都没有则返回最低质量 0。
//! 所有令牌在存储和查询前都统一转换为小写。

use std::fmt;

use log::debug;

use crate::param::{HttpEncoding, ANY_TOKEN};
use crate::qvalue::{QValue, MAX_QUALITY};

/// 按插入顺序保存 "令牌 → 质量值" 的列表，令牌唯一。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QValueList {
    entries: Vec<(String, QValue)>,
}

impl QValueList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn unify(token: &str) -> String {
        token.trim().to_lowercase()
    }

    /// 添加或替换条目。已存在的令牌保留原来的位置，只更新质量。
    pub fn add(&mut self, token: &str, quality: f64) {
        let key = Self::unify(token);
        if key.is_empty() {
            return;
        }
        let value = QValue::new(quality);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    fn exact(&self, token: &str) -> Option<QValue> {
        let key = Self::unify(token);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, q)| *q)
    }

    /// 精确匹配 → 通配符 `*` → 最低质量
    pub fn get_qvalue(&self, token: &str) -> QValue {
        self.exact(token)
            .or_else(|| self.exact(ANY_TOKEN))
            .unwrap_or(QValue::MIN_QVALUE)
    }

    /// 0 表示不接受，1 表示完全接受
    pub fn get_quality(&self, token: &str) -> f64 {
        self.get_qvalue(token).quality()
    }

    pub fn supports(&self, token: &str) -> bool {
        self.get_qvalue(token).is_above_minimum_quality()
    }

    /// 不考虑通配符，只看令牌本身是否被接受
    pub fn explicitly_supports(&self, token: &str) -> bool {
        self.exact(token)
            .map_or(false, |q| q.is_above_minimum_quality())
    }

    /// 质量不低于阈值的令牌（按插入顺序）
    pub fn all_at_least(&self, threshold: f64) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, q)| q.quality() >= threshold)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// 质量低于阈值的令牌（按插入顺序）
    pub fn all_below(&self, threshold: f64) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, q)| q.quality() < threshold)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// 质量最高的令牌，质量相同时先出现者优先
    pub fn best(&self) -> Option<(&str, QValue)> {
        let mut best: Option<(&str, QValue)> = None;
        for (k, q) in &self.entries {
            match best {
                Some((_, b)) if *q <= b => {}
                _ => best = Some((k.as_str(), *q)),
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, QValue)> {
        self.entries.iter().map(|(k, q)| (k.as_str(), *q))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按模块文档中的规则解析标头值；缺失或空白时插入 `default_token`。
    fn parse(header: Option<&str>, default_token: &str) -> Self {
        let mut list = Self::new();
        let value = match header {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                list.add(default_token, MAX_QUALITY);
                return list;
            }
        };
        for item in value.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let mut parts = item.splitn(2, ';');
            let token = parts.next().unwrap_or("").trim();
            let quality = match parts.next().map(str::trim) {
                Some(param) if param.starts_with("q=") => {
                    param[2..].trim().parse::<f64>().unwrap_or(MAX_QUALITY)
                }
                _ => MAX_QUALITY,
            };
            list.add(token, quality);
        }
        if list.is_empty() {
            // 只有分隔符或空条目时与缺失标头等价
            list.add(default_token, MAX_QUALITY);
        }
        list
    }
}

impl fmt::Display for QValueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .entries
            .iter()
            .map(|(k, q)| format!("{};q={}", k, q.quality()))
            .collect();
        f.write_str(&items.join(", "))
    }
}

macro_rules! accept_list {
    ($(#[$meta:meta])* $name:ident, $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            list: QValueList,
        }

        impl $name {
            /// 标头缺失或为空时使用的默认令牌
            pub const DEFAULT_TOKEN: &'static str = $default;

            pub fn from_header(header: Option<&str>) -> Self {
                let list = QValueList::parse(header, Self::DEFAULT_TOKEN);
                debug!("{}解析结果: {}", stringify!($name), list);
                Self { list }
            }

            pub fn list(&self) -> &QValueList {
                &self.list
            }
        }

        impl std::ops::Deref for $name {
            type Target = QValueList;

            fn deref(&self) -> &QValueList {
                &self.list
            }
        }
    };
}

accept_list!(
    /// `Accept-Charset` 标头
    AcceptCharsetList,
    ANY_TOKEN
);

accept_list!(
    /// `Accept-Encoding` 标头
    AcceptEncodingList,
    AcceptEncodingList::IDENTITY_ENCODING
);

accept_list!(
    /// `Accept-Language` 标头，语言标签统一小写
    AcceptLanguageList,
    ANY_TOKEN
);

impl AcceptEncodingList {
    pub const IDENTITY_ENCODING: &'static str = "identity";
    pub const GZIP_ENCODING: &'static str = "gzip";
    pub const X_GZIP_ENCODING: &'static str = "x-gzip";
    pub const DEFLATE_ENCODING: &'static str = "deflate";
    pub const COMPRESS_ENCODING: &'static str = "compress";
    pub const X_COMPRESS_ENCODING: &'static str = "x-compress";

    pub fn supports_gzip(&self) -> bool {
        self.used_gzip_encoding().is_some()
    }

    /// `gzip` 或 `x-gzip`，都不接受时为 `None`
    pub fn used_gzip_encoding(&self) -> Option<&'static str> {
        if self.supports(Self::GZIP_ENCODING) {
            Some(Self::GZIP_ENCODING)
        } else if self.supports(Self::X_GZIP_ENCODING) {
            Some(Self::X_GZIP_ENCODING)
        } else {
            None
        }
    }

    pub fn supports_deflate(&self) -> bool {
        self.used_deflate_encoding().is_some()
    }

    pub fn used_deflate_encoding(&self) -> Option<&'static str> {
        if self.supports(Self::DEFLATE_ENCODING) {
            Some(Self::DEFLATE_ENCODING)
        } else {
            None
        }
    }

    pub fn supports_compress(&self) -> bool {
        self.used_compress_encoding().is_some()
    }

    pub fn used_compress_encoding(&self) -> Option<&'static str> {
        if self.supports(Self::COMPRESS_ENCODING) {
            Some(Self::COMPRESS_ENCODING)
        } else if self.supports(Self::X_COMPRESS_ENCODING) {
            Some(Self::X_COMPRESS_ENCODING)
        } else {
            None
        }
    }

    /// 在服务端可用的编码中选出客户端质量最高的一个。
    ///
    /// `available` 的顺序即服务端偏好，质量相同时靠前者优先。
    /// 通配符不参与选择，只有显式列出的编码才会被使用；没有可用编码时返回 `None`（identity）。
    pub fn preferred_encoding(&self, available: &[HttpEncoding]) -> Option<HttpEncoding> {
        let mut chosen: Option<(HttpEncoding, QValue)> = None;
        for encoding in available {
            let quality = match *encoding {
                HttpEncoding::Gzip => self
                    .exact(Self::GZIP_ENCODING)
                    .max(self.exact(Self::X_GZIP_ENCODING)),
                _ => self.exact(encoding.token()),
            };
            let quality = match quality {
                Some(q) if q.is_above_minimum_quality() => q,
                _ => continue,
            };
            match chosen {
                Some((_, best)) if quality <= best => {}
                _ => chosen = Some((*encoding, quality)),
            }
        }
        chosen.map(|(encoding, _)| encoding)
    }
}

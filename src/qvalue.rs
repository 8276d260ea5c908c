// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 质量值（Quality Value）
//!
//! `Accept-Charset`/`Accept-Encoding`/`Accept-Language` 标头中每个条目都可以携带
//! `q=` 权重，取值范围为 `[0, 1]`（参考 RFC 2616 §3.9）。
//! `QValue` 是对该权重的不可变包装：越界输入会被记录警告并截断，而不是被拒绝。

use std::cmp::Ordering;
use std::fmt;

use log::warn;

/// 最低质量，表示"不接受"
pub const MIN_QUALITY: f64 = 0.0;

/// 最高质量，表示"完全接受"
pub const MAX_QUALITY: f64 = 1.0;

/// 低/高质量的分界点（包含于"低"）
const LOW_HIGH_BOUNDARY: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct QValue {
    quality: f64,
}

impl QValue {
    pub const MIN_QVALUE: QValue = QValue {
        quality: MIN_QUALITY,
    };

    pub const MAX_QVALUE: QValue = QValue {
        quality: MAX_QUALITY,
    };

    /// 构造质量值，超出 `[0, 1]` 的输入被截断到边界，`NaN` 视为 0。
    pub fn new(quality: f64) -> Self {
        let clamped = if quality.is_nan() {
            warn!("质量值NaN无效，按{}处理", MIN_QUALITY);
            MIN_QUALITY
        } else if quality < MIN_QUALITY {
            warn!("质量值{}过小，截断为{}", quality, MIN_QUALITY);
            MIN_QUALITY
        } else if quality > MAX_QUALITY {
            warn!("质量值{}过大，截断为{}", quality, MAX_QUALITY);
            MAX_QUALITY
        } else {
            quality
        };
        Self { quality: clamped }
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn is_min_value(&self) -> bool {
        self.quality == MIN_QUALITY
    }

    pub fn is_max_value(&self) -> bool {
        self.quality == MAX_QUALITY
    }

    pub fn is_above_minimum_quality(&self) -> bool {
        self.quality > MIN_QUALITY
    }

    pub fn is_below_maximum_quality(&self) -> bool {
        self.quality < MAX_QUALITY
    }

    /// 质量 ≤ 0.5
    pub fn is_low_value(&self) -> bool {
        self.quality <= LOW_HIGH_BOUNDARY
    }

    /// 质量 > 0.5
    pub fn is_high_value(&self) -> bool {
        self.quality > LOW_HIGH_BOUNDARY
    }

    /// 既不是 0 也不是 1，即客户端表达了可协商的偏好
    pub fn is_negotiable(&self) -> bool {
        self.is_above_minimum_quality() && self.is_below_maximum_quality()
    }
}

impl Default for QValue {
    fn default() -> Self {
        Self::MAX_QVALUE
    }
}

impl PartialEq for QValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QValue {}

impl PartialOrd for QValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QValue {
    fn cmp(&self, other: &Self) -> Ordering {
        // 构造时已排除 NaN
        self.quality.total_cmp(&other.quality)
    }
}

impl fmt::Display for QValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q={}", self.quality)
    }
}

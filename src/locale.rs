// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 语言区域（Locale）
//!
//! `Locale` 是 `语言[_国家[_变体]]` 形式的区域标识，`LocaleManager` 记录应用支持的
//! 显示语言以及默认语言。请求中的 `locale` 参数只有在被 `LocaleManager` 登记为
//! 支持的语言时才会生效。

use std::fmt;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::accept::AcceptLanguageList;
use crate::exception::Exception;

lazy_static! {
    static ref LOCALE_PATTERN: Regex =
        Regex::new(r"^(?:([A-Za-z]{2,3})|)(?:[_-]([A-Za-z]{2}|[0-9]{3})(?:[_-]([A-Za-z0-9]{1,8}))?)?$")
            .expect("locale pattern");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    country: String,
    variant: String,
}

impl Locale {
    /// 解析 `de`、`de_AT`、`de-AT`、`de_AT_EURO` 以及仅含国家的 `_AT`。
    pub fn parse(tag: &str) -> Result<Self, Exception> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Exception::InvalidLocale(tag.to_string()));
        }
        let captures = match LOCALE_PATTERN.captures(tag) {
            Some(c) => c,
            None => return Err(Exception::InvalidLocale(tag.to_string())),
        };
        let part = |i: usize| captures.get(i).map_or("", |m| m.as_str());
        let locale = Self {
            language: part(1).to_lowercase(),
            country: part(2).to_uppercase(),
            variant: part(3).to_string(),
        };
        if locale.language.is_empty() && locale.country.is_empty() {
            return Err(Exception::InvalidLocale(tag.to_string()));
        }
        Ok(locale)
    }

    pub fn new(language: &str, country: &str) -> Self {
        Self {
            language: language.to_lowercase(),
            country: country.to_uppercase(),
            variant: String::new(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// 仅保留国家部分的区域，国家为空时返回 `None`
    pub fn country_locale(&self) -> Option<Locale> {
        if self.country.is_empty() {
            None
        } else {
            Some(Self {
                language: String::new(),
                country: self.country.clone(),
                variant: String::new(),
            })
        }
    }

    /// BCP 47 风格的标签，例如 `de-AT`
    pub fn to_language_tag(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        for p in [&self.language, &self.country, &self.variant] {
            if !p.is_empty() {
                parts.push(p.as_str());
            }
        }
        parts.join("-")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if !self.country.is_empty() || !self.variant.is_empty() {
            write!(f, "_{}", self.country)?;
        }
        if !self.variant.is_empty() {
            write!(f, "_{}", self.variant)?;
        }
        Ok(())
    }
}

/// 应用支持的显示语言集合（保持登记顺序）与默认语言。
#[derive(Debug, Clone, Default)]
pub struct LocaleManager {
    supported: Vec<Locale>,
    default_locale: Option<Locale>,
}

impl LocaleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置中的语言标签构建；默认语言若未登记则自动加入支持列表。
    pub fn from_tags(supported: &[String], default_locale: Option<&str>) -> Result<Self, Exception> {
        let mut manager = Self::new();
        for tag in supported {
            manager.add_supported_locale(Locale::parse(tag)?);
        }
        if let Some(tag) = default_locale {
            let locale = Locale::parse(tag)?;
            manager.add_supported_locale(locale.clone());
            manager.set_default_locale(locale)?;
        }
        Ok(manager)
    }

    /// 重复登记会被忽略，返回是否新增
    pub fn add_supported_locale(&mut self, locale: Locale) -> bool {
        if self.supported.contains(&locale) {
            return false;
        }
        self.supported.push(locale);
        true
    }

    /// 默认语言必须已经是支持的语言
    pub fn set_default_locale(&mut self, locale: Locale) -> Result<(), Exception> {
        if !self.is_supported_locale(&locale) {
            warn!("默认语言{}未被登记为支持的语言", locale);
            return Err(Exception::InvalidLocale(locale.to_string()));
        }
        self.default_locale = Some(locale);
        Ok(())
    }

    pub fn is_supported_locale(&self, locale: &Locale) -> bool {
        self.supported.contains(locale)
    }

    pub fn default_locale(&self) -> Option<&Locale> {
        self.default_locale.as_ref()
    }

    pub fn supported_locales(&self) -> &[Locale] {
        &self.supported
    }

    /// 根据 `Accept-Language` 在支持的语言中选出质量最高者。
    ///
    /// 先按完整标签匹配（`de-at`），再按语言部分匹配（`de`）；通配符只对
    /// 没有明确列出的语言生效。质量为 0 或没有匹配时返回 `None`。
    pub fn best_match(&self, accept: &AcceptLanguageList) -> Option<&Locale> {
        let mut best: Option<(&Locale, f64)> = None;
        for locale in &self.supported {
            let full = accept.get_quality(&locale.to_language_tag());
            let quality = if accept.explicitly_supports(&locale.to_language_tag()) {
                full
            } else if accept.explicitly_supports(locale.language()) {
                accept.get_quality(locale.language())
            } else {
                full
            };
            if quality <= 0.0 {
                continue;
            }
            match best {
                Some((_, q)) if quality <= q => {}
                _ => best = Some((locale, quality)),
            }
        }
        best.map(|(l, _)| l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        let l = Locale::parse("de_AT").unwrap();
        assert_eq!(l.language(), "de");
        assert_eq!(l.country(), "AT");
        assert_eq!(Locale::parse("de-at").unwrap(), l);
        assert_eq!(Locale::parse("EN").unwrap().language(), "en");
        assert_eq!(Locale::parse("de_AT_EURO").unwrap().variant(), "EURO");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Locale::parse("").is_err());
        assert!(Locale::parse("deutsch").is_err());
        assert!(Locale::parse("de_AT;rm -rf").is_err());
        assert!(matches!(Locale::parse("_"), Err(Exception::InvalidLocale(_))));
    }

    #[test]
    fn test_display_and_tag() {
        let l = Locale::new("de", "at");
        assert_eq!(l.to_string(), "de_AT");
        assert_eq!(l.to_language_tag(), "de-AT");
        assert_eq!(Locale::new("en", "").to_string(), "en");
    }

    #[test]
    fn test_country_locale() {
        let l = Locale::parse("de_AT").unwrap();
        let country = l.country_locale().unwrap();
        assert_eq!(country.country(), "AT");
        assert_eq!(country.language(), "");
        assert_eq!(country.to_string(), "_AT");
        assert!(Locale::parse("de").unwrap().country_locale().is_none());
    }

    #[test]
    fn test_manager_supported_and_default() {
        let supported = vec!["de_AT".to_string(), "en_US".to_string()];
        let manager = LocaleManager::from_tags(&supported, Some("en_US")).unwrap();
        assert!(manager.is_supported_locale(&Locale::new("de", "AT")));
        assert!(!manager.is_supported_locale(&Locale::new("fr", "FR")));
        assert_eq!(manager.default_locale(), Some(&Locale::new("en", "US")));
        assert_eq!(manager.supported_locales().len(), 2);
    }

    #[test]
    fn test_default_must_be_supported() {
        let mut manager = LocaleManager::new();
        assert!(manager.set_default_locale(Locale::new("de", "")).is_err());
        assert!(manager.default_locale().is_none());
    }

    #[test]
    fn test_best_match() {
        let supported = vec!["de_AT".to_string(), "en_US".to_string(), "fr".to_string()];
        let manager = LocaleManager::from_tags(&supported, None).unwrap();

        let accept = AcceptLanguageList::from_header(Some("en;q=0.4, de-AT;q=0.8"));
        assert_eq!(manager.best_match(&accept), Some(&Locale::new("de", "AT")));

        let accept = AcceptLanguageList::from_header(Some("en, *;q=0.1"));
        assert_eq!(manager.best_match(&accept), Some(&Locale::new("en", "US")));

        let accept = AcceptLanguageList::from_header(Some("ja"));
        assert_eq!(manager.best_match(&accept), None);
    }
}

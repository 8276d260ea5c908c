// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::error;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::{
    locale::Locale,
    menu::{DisplayContext, MenuItemPage, MenuObject},
    param::STATUS_CODES,
    request_manager::RequestManager,
};

pub struct HtmlBuilder {
    title: String,
    lang: Option<String>,
    css: String,
    script: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => match STATUS_CODES.get(&code) {
                Some(d) => *d,
                None => {
                    error!("非法的状态码：{}", code);
                    "Unknown"
                }
            },
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self {
            title,
            lang: None,
            css,
            script: "".to_string(),
            body,
        }
    }

    /// 渲染选中菜单项对应的页面：左侧为导航菜单（隐藏不可见的对象），
    /// 底部为显示语言切换链接。
    pub fn from_menu_page(
        manager: &RequestManager,
        selected: &MenuItemPage,
        locale: &Locale,
        ctx: &DisplayContext<'_>,
    ) -> Self {
        let settings = manager.settings();
        let mut body = String::new();

        body.push_str("<nav>");
        render_menu_level(
            manager,
            manager.menu_tree().root_children(),
            selected,
            ctx,
            &settings.menu_item_parameter,
            &mut body,
        );
        body.push_str("</nav>");

        body.push_str(&format!(
            r#"
            <main>
                <h1>{}</h1>
                <p id="menuitem">{}</p>
            </main>
            "#,
            escape_html(selected.title()),
            escape_html(selected.id())
        ));

        body.push_str(r#"<footer><ul class="locales">"#);
        for supported in manager.locale_manager().supported_locales() {
            let tag = supported.to_string();
            if supported == locale {
                body.push_str(&format!(
                    r#"<li><strong lang="{}">{}</strong></li>"#,
                    supported.to_language_tag(),
                    escape_html(&tag)
                ));
            } else {
                body.push_str(&format!(
                    r#"<li><a href="?{}={}" lang="{}">{}</a></li>"#,
                    settings.locale_parameter,
                    encode(&tag),
                    supported.to_language_tag(),
                    escape_html(&tag)
                ));
            }
        }
        body.push_str("</ul></footer>");

        let css = r"
            nav {
                float: left;
                width: 12em;
            }

            li.selected > a {
                font-weight: bold;
            }

            footer ul.locales li {
                display: inline;
                padding: 0 4px;
            }"
        .to_string();

        HtmlBuilder {
            title: selected.title().to_string(),
            lang: Some(locale.to_language_tag()),
            css,
            script: "".to_string(),
            body,
        }
    }

    pub fn build(&self) -> String {
        let html_open = match &self.lang {
            Some(lang) => format!(r#"<html lang="{}">"#, lang),
            None => "<html>".to_string(),
        };
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由webscopes自动生成 -->
            {}
                <head>
                    <meta charset="utf-8">
                    <script>{}</script>
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            html_open,
            self.script,
            escape_html(&self.title),
            self.css,
            self.body
        )
    }
}

fn render_menu_level(
    manager: &RequestManager,
    objects: Vec<&MenuObject>,
    selected: &MenuItemPage,
    ctx: &DisplayContext<'_>,
    parameter: &str,
    out: &mut String,
) {
    let visible: Vec<&MenuObject> = objects
        .into_iter()
        .filter(|o| o.matches_display_filter(ctx))
        .collect();
    if visible.is_empty() {
        return;
    }
    out.push_str("<ul>");
    for object in visible {
        match object {
            MenuObject::Page(page) => {
                let class = if page.id() == selected.id() {
                    r#" class="selected""#
                } else {
                    ""
                };
                out.push_str(&format!(
                    r#"<li{}><a href="?{}={}">{}</a>"#,
                    class,
                    parameter,
                    encode(page.id()),
                    escape_html(page.title())
                ));
            }
            MenuObject::External(external) => {
                out.push_str(&format!(
                    r#"<li><a href="{}" rel="external">{}</a>"#,
                    escape_html(external.url()),
                    escape_html(external.title())
                ));
            }
            MenuObject::Separator(_) => out.push_str("<li><hr>"),
        }
        render_menu_level(
            manager,
            manager.menu_tree().children_of(object.id()),
            selected,
            ctx,
            parameter,
            out,
        );
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

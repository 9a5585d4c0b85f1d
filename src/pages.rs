// src/pages.rs
//! Server-rendered HTML pages. Templates are compiled into the binary and use
//! `{{ key }}` placeholders; values are HTML-escaped.

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

fn re_placeholder() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Chat,
    Analyze,
    Search,
}

impl Page {
    fn template(self) -> &'static str {
        match self {
            Page::Home => include_str!("../templates/index.html"),
            Page::Chat => include_str!("../templates/chat.html"),
            Page::Analyze => include_str!("../templates/analyze.html"),
            Page::Search => include_str!("../templates/search.html"),
        }
    }

    fn title(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Chat => "Chat",
            Page::Analyze => "Analyze a post",
            Page::Search => "Search",
        }
    }

    pub fn render(self, app_name: &str) -> String {
        let title = format!("{} | {}", self.title(), app_name);
        render(self.template(), &[("title", title.as_str()), ("app_name", app_name)])
    }
}

/// Substitute `{{ key }}` placeholders. Unknown keys render as empty text.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    re_placeholder()
        .replace_all(template, |caps: &Captures| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| html_escape::encode_text(v).into_owned())
                .unwrap_or_default()
        })
        .into_owned()
}

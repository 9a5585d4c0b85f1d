// src/knowledge/providers/html.rs
//! Minimal element lookup over raw HTML.
//!
//! Supports two selectors, a tag name and a single class, which is all the
//! listing pages need. Elements are delimited by counting nested open/close
//! tags of the same name; unclosed elements run to the end of the input.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::text::html_to_text;

fn re_open_tag() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9-]*)((?:\s[^>]*)?)>").unwrap())
}

fn re_any_tag() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*)((?:\s[^>]*)?)>").unwrap())
}

fn re_class_attr() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)class\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
    })
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// `h2`
    Tag(&'static str),
    /// `.entry-content`
    Class(&'static str),
}

impl Selector {
    fn matches(&self, tag: &str, attrs: &str) -> bool {
        match self {
            Selector::Tag(name) => tag.eq_ignore_ascii_case(name),
            Selector::Class(class) => class_list(attrs).any(|c| c == *class),
        }
    }
}

fn class_list(attrs: &str) -> impl Iterator<Item = &str> {
    re_class_attr()
        .captures(attrs)
        .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str())
        .unwrap_or("")
        .split_whitespace()
}

/// A matched element. `inner` borrows the HTML between its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'a> {
    pub tag: String,
    pub inner: &'a str,
}

impl Element<'_> {
    /// Visible text of the element, whitespace-collapsed.
    pub fn text(&self) -> String {
        html_to_text(self.inner)
    }
}

/// Every element matching `selector`, in document order. Nested matches are
/// reported as well as their ancestors.
pub fn find_all<'a>(html: &'a str, selector: Selector) -> Vec<Element<'a>> {
    let mut out = Vec::new();
    for caps in re_open_tag().captures_iter(html) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if !selector.matches(tag.as_str(), attrs) {
            continue;
        }
        let name = tag.as_str().to_ascii_lowercase();
        let self_closing = attrs.trim_end().ends_with('/');
        let inner = if self_closing || VOID_TAGS.contains(&name.as_str()) {
            ""
        } else {
            let start = whole.end();
            let end = closing_tag_offset(&html[start..], &name).map_or(html.len(), |o| start + o);
            &html[start..end]
        };
        out.push(Element { tag: name, inner });
    }
    out
}

pub fn find_first<'a>(html: &'a str, selector: Selector) -> Option<Element<'a>> {
    find_all(html, selector).into_iter().next()
}

/// Byte offset of the `</name>` that balances an already-consumed `<name>`.
fn closing_tag_offset(rest: &str, name: &str) -> Option<usize> {
    let mut depth = 1usize;
    for caps in re_any_tag().captures_iter(rest) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if !tag.as_str().eq_ignore_ascii_case(name) {
            continue;
        }
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some(whole.start());
            }
        } else if !caps
            .get(3)
            .is_some_and(|m| m.as_str().trim_end().ends_with('/'))
        {
            depth += 1;
        }
    }
    None
}

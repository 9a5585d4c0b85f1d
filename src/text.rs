// src/text.rs
//! Stateless text helpers shared by the scrapers, prompts and post analysis.

use once_cell::sync::OnceCell;
use regex::Regex;

fn re_non_word() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_hashtag() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"#\w+").unwrap())
}

fn re_mention() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"@\w+").unwrap())
}

/// Lowercase, replace punctuation with spaces and collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let out = re_non_word().replace_all(s, " ");
    let out = re_ws().replace_all(&out, " ");
    out.to_lowercase().trim().to_string()
}

/// Turn an HTML fragment into a single line of plain text:
/// strip tags, decode entities, collapse whitespace.
pub fn html_to_text(s: &str) -> String {
    // Tags go first so that encoded `&lt;b&gt;` survives as literal text.
    let stripped = re_tags().replace_all(s, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    let decoded = decoded.replace('\u{00A0}', " ");
    re_ws().replace_all(&decoded, " ").trim().to_string()
}

/// Split `text` into windows of `chunk_size` words where consecutive windows
/// share `overlap` words. The last window may be shorter.
///
/// An `overlap >= chunk_size` would never advance, so the step is clamped to
/// at least one word.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = chunk_size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let end = start.saturating_add(size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start = start.saturating_add(step);
    }
    chunks
}

/// All `#word` tokens in order of appearance, case preserved.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    re_hashtag()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// All `@word` tokens in order of appearance, case preserved.
pub fn extract_mentions(text: &str) -> Vec<String> {
    re_mention()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Cut `s` to at most `max` chars, appending an ellipsis when cut. Used for logs.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_punctuation_and_lowercases() {
        assert_eq!(clean_text("  Hello,   World!! Meta's  "), "hello world meta s");
    }

    #[test]
    fn html_to_text_strips_tags_and_entities() {
        let html = "<p>Hello&nbsp;<b>there</b> &amp;\n  friends</p>";
        assert_eq!(html_to_text(html), "Hello there & friends");
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let text = (0..10).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, 4, 1);
        assert_eq!(chunks, vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9", "w9"]);

        for pair in chunks.windows(2) {
            let a: Vec<&str> = pair[0].split(' ').collect();
            let b: Vec<&str> = pair[1].split(' ').collect();
            assert_eq!(a[a.len() - 1..], b[..1]);
        }
    }

    #[test]
    fn chunks_reconstruct_original_sequence() {
        let text = "a b c d e f g h i j k l m";
        let (size, overlap) = (5, 2);
        let chunks = chunk_text(text, size, overlap);

        let mut rebuilt: Vec<String> = Vec::new();
        for (i, c) in chunks.iter().enumerate() {
            let words: Vec<&str> = c.split(' ').collect();
            assert!(words.len() <= size);
            let skip = if i == 0 { 0 } else { overlap.min(words.len()) };
            rebuilt.extend(words[skip..].iter().map(|w| w.to_string()));
        }
        let original: Vec<String> = text.split(' ').map(String::from).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn chunk_text_handles_degenerate_inputs() {
        assert!(chunk_text("", 10, 2).is_empty());
        assert_eq!(chunk_text("one two", 10, 2), vec!["one two"]);
        // overlap larger than size still terminates
        assert_eq!(chunk_text("a b c", 2, 5).len(), 3);
        assert_eq!(chunk_text("a b c", usize::MAX, usize::MAX - 1), vec!["a b c"]);
    }

    #[test]
    fn hashtags_and_mentions_in_order() {
        let s = "hello #fb @meta #ai";
        assert_eq!(extract_hashtags(s), vec!["#fb", "#ai"]);
        assert_eq!(extract_mentions(s), vec!["@meta"]);
    }

    #[test]
    fn hashtags_keep_case_and_unicode() {
        assert_eq!(extract_hashtags("#Việt #DowJones"), vec!["#Việt", "#DowJones"]);
    }
}

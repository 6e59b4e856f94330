//! HTML cleanup.
//!
//! Rules (applied in order):
//! 1. Remove `<script>`, `<style>`, `<meta>` and stylesheet `<link>` elements
//!    until none are left
//! 2. Strip `on*` handlers, `style`, `class` and empty-valued attributes
//! 3. Remove empty `<p>`, `<div>` and `<span>` elements until none are left
//! 4. Collapse whitespace runs to one space and trim
//! 5. Delegated markup fix over the first `fix_preview_chars` characters
//!
//! Rules 1–4 are regex passes over the raw text, not a DOM rewrite: they
//! accept whatever the upload contains and never fail on malformed markup.
//! Tag patterns are quote-aware, so `title="a > b"` stays one attribute. A tag
//! with an unterminated quote does not match and is left as it is.

use super::CleanupContext;
use crate::output::ProcessableFile;
use crate::pipeline::capability::{rewrite, RewriteTask};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub async fn clean(ctx: CleanupContext<'_>, mut file: ProcessableFile) -> ProcessableFile {
    file.cleaned = clean_markup(&file.cleaned);

    match rewrite(
        ctx.capability,
        RewriteTask::FixMarkup,
        &file.cleaned,
        ctx.config.fix_preview_chars,
    )
    .await
    {
        Ok(fixed) => file.cleaned = fixed,
        Err(e) => ctx.fallback(&mut file, "fix_markup", &e),
    }
    file
}

/// The deterministic part of the HTML strategy.
pub fn clean_markup(input: &str) -> String {
    let s = remove_unwanted_elements(input);
    let s = strip_attributes(&s);
    let s = remove_empty_elements(&s);
    collapse_whitespace(&s)
}

/// One unit of a tag body: a quoted value or any character that cannot end
/// the tag. A `>` inside quotes does not close the tag.
const TAG_BODY: &str = r#"(?:[^<>"']|"[^"]*"|'[^']*')"#;

fn tag_regex(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("{body}", TAG_BODY)).unwrap()
}

/// Apply `rules` until a full pass changes nothing.
///
/// A removal can splice its neighbours into a new match, as in
/// `<scr<script></script>ipt>`.
fn until_stable(input: &str, rules: &[Regex]) -> String {
    let mut current = input.to_string();
    loop {
        let next = rules
            .iter()
            .fold(current.clone(), |s, re| re.replace_all(&s, "").into_owned());
        if next == current {
            return current;
        }
        current = next;
    }
}

// ── Rule 1: Unwanted elements ─────────────────────────────────────────────

static RE_UNWANTED: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        tag_regex(r"(?is)<script\b{body}*>.*?</script\s*>"),
        tag_regex(r"(?is)<style\b{body}*>.*?</style\s*>"),
        tag_regex(r"(?i)<meta\b{body}*>"),
        tag_regex(
            r#"(?i)<link\b{body}*?\brel\s*=\s*(?:"[^"]*\bstylesheet\b[^"]*"|'[^']*\bstylesheet\b[^']*'|stylesheet\b){body}*>"#,
        ),
    ]
});

fn remove_unwanted_elements(input: &str) -> String {
    until_stable(input, &*RE_UNWANTED)
}

// ── Rule 2: Attributes ────────────────────────────────────────────────────

static RE_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| tag_regex(r"<([A-Za-z][A-Za-z0-9:-]*)(\s{body}*?)?(/?)>"));

static RE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s="'<>/]+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#).unwrap()
});

fn strip_attributes(input: &str) -> String {
    RE_OPEN_TAG
        .replace_all(input, |caps: &Captures| {
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            let mut tag = format!("<{}", &caps[1]);
            for attr in RE_ATTR.captures_iter(attrs) {
                if keep_attribute(&attr[1], attr.get(2).map(|v| v.as_str())) {
                    tag.push(' ');
                    tag.push_str(&attr[0]);
                }
            }
            tag.push_str(&caps[3]);
            tag.push('>');
            tag
        })
        .into_owned()
}

fn keep_attribute(name: &str, value: Option<&str>) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") || name == "style" || name == "class" {
        return false;
    }
    match value {
        Some(v) => !v.trim_matches(|c| c == '"' || c == '\'').trim().is_empty(),
        None => true,
    }
}

// ── Rule 3: Empty elements ────────────────────────────────────────────────

static RE_EMPTY: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        tag_regex(r"(?i)<p(?:\s{body}*)?>\s*</p\s*>"),
        tag_regex(r"(?i)<div(?:\s{body}*)?>\s*</div\s*>"),
        tag_regex(r"(?i)<span(?:\s{body}*)?>\s*</span\s*>"),
    ]
});

/// Loops so `<div><p> </p></div>` disappears entirely.
fn remove_empty_elements(input: &str) -> String {
    until_stable(input, &*RE_EMPTY)
}

// ── Rule 4: Whitespace ────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

//! Markdown cleanup.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. Trim trailing whitespace per line, so whitespace-only lines become blank
//! 3. Collapse runs of blank lines to a single blank line
//! 4. Remove indentation before `#` headings (outside fenced code)
//! 5. Normalise over-long emphasis and backtick runs; trim the document
//! 6. Ensure a level-1 heading, keeping any front-matter block on top
//! 7. Delegated Markdown fix over the body
//!
//! Rules 1–5 are [`normalise`]. They are idempotent, so cleaning an already
//! cleaned file is a no-op.

use super::CleanupContext;
use crate::error::CapabilityError;
use crate::output::ProcessableFile;
use crate::pipeline::archive::file_name_of;
use crate::pipeline::capability::{preview, rewrite, CapabilityTask, RewriteTask};
use once_cell::sync::Lazy;
use regex::Regex;

pub async fn clean(ctx: CleanupContext<'_>, mut file: ProcessableFile) -> ProcessableFile {
    let normalised = normalise(&file.cleaned);
    let (front, body) = split_front_matter(&normalised);

    let body = if has_title_heading(body) {
        body.to_string()
    } else {
        let title = match generate_title(ctx, &file.path, body).await {
            Ok(title) => title,
            Err(e) => {
                ctx.fallback(&mut file, "generate_title", &e);
                title_from_file_name(&file.path)
            }
        };
        with_title(&title, body)
    };
    file.cleaned = join_front_matter(front, &body);

    match rewrite(
        ctx.capability,
        RewriteTask::FixMarkdown,
        &body,
        ctx.config.fix_preview_chars,
    )
    .await
    {
        Ok(fixed) => file.cleaned = join_front_matter(front, &fixed),
        Err(e) => ctx.fallback(&mut file, "fix_markdown", &e),
    }
    file
}

/// Rules 1–5.
pub fn normalise(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = dedent_headings(&s);
    normalise_runs(&s).trim().to_string()
}

// ── Rule 1: Line endings ──────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trailing whitespace ───────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Blank lines ───────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 4: Heading indentation ───────────────────────────────────────────

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

fn dedent_headings(input: &str) -> String {
    let mut in_fence = false;
    input
        .lines()
        .map(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                return line;
            }
            let trimmed = line.trim_start();
            if !in_fence && trimmed.len() != line.len() && trimmed.starts_with('#') {
                trimmed
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Emphasis and backtick runs ────────────────────────────────────

static RE_RUNS: Lazy<[(Regex, &'static str); 3]> = Lazy::new(|| {
    [
        (Regex::new(r"\*{4,}").unwrap(), "***"),
        (Regex::new(r"_{4,}").unwrap(), "___"),
        (Regex::new(r"`{4,}").unwrap(), "```"),
    ]
});

fn normalise_runs(input: &str) -> String {
    RE_RUNS.iter().fold(input.to_string(), |s, (re, with)| {
        re.replace_all(&s, *with).into_owned()
    })
}

// ── Rule 6: Title heading ─────────────────────────────────────────────────

/// Split a leading `---` … `---` block from the body.
///
/// The returned front matter includes both delimiter lines; the body has its
/// leading blank lines removed.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return (None, text);
    };
    let mut offset = 4;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" {
            let front = text[..offset].trim_end();
            let body = text[offset..].trim_start_matches('\n');
            return (Some(front), body);
        }
    }
    (None, text)
}

fn join_front_matter(front: Option<&str>, body: &str) -> String {
    match front {
        Some(front) if body.is_empty() => front.to_string(),
        Some(front) => format!("{front}\n\n{body}"),
        None => body.to_string(),
    }
}

/// Whether the body has a `# ` heading outside fenced code.
fn has_title_heading(body: &str) -> bool {
    let mut in_fence = false;
    for line in body.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence && (line == "#" || line.starts_with("# ") || line.starts_with("#\t")) {
            return true;
        }
    }
    false
}

fn with_title(title: &str, body: &str) -> String {
    if body.is_empty() {
        format!("# {title}")
    } else {
        format!("# {title}\n\n{body}")
    }
}

async fn generate_title(
    ctx: CleanupContext<'_>,
    path: &str,
    body: &str,
) -> Result<String, CapabilityError> {
    let task = CapabilityTask::GenerateTitle {
        file_name: file_name_of(path),
        preview: preview(body, ctx.config.title_preview_chars),
    };
    let answer = ctx.capability.invoke(task).await?;
    let title = answer
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim().trim_matches(['"', '\'']))
        .find(|l| !l.is_empty())
        .ok_or(CapabilityError::EmptyResponse)?;
    Ok(title.to_string())
}

/// `getting-started_v2.md` → `Getting Started V2`.
pub fn title_from_file_name(path: &str) -> String {
    let name = file_name_of(path);
    let stem = match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    };
    let title = stem
        .split(['-', '_', '.', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalise)
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{ctx, offline, Echo};
    use super::*;

    #[test]
    fn line_endings_blank_lines_and_trailing_space() {
        let input = "# T\r\n\r\n\r\n\r\npara   \r\n \n\t\nnext\rlast";
        assert_eq!(normalise(input), "# T\n\npara\n\nnext\nlast");
    }

    #[test]
    fn dedents_headings_outside_fences_only() {
        let input = "   ## Indented\n```\n  # comment in code\n```\n\t# Tabbed";
        assert_eq!(
            normalise(input),
            "## Indented\n```\n  # comment in code\n```\n# Tabbed"
        );
    }

    #[test]
    fn normalises_long_runs() {
        assert_eq!(normalise("******bold****** ____x____ ````code````"), "***bold*** ___x___ ```code```");
    }

    #[test]
    fn normalise_is_idempotent() {
        let input = "  # A\r\n\r\n\r\n\r\ntext  \n\n\n\n**** end ____";
        let once = normalise(input);
        assert_eq!(normalise(&once), once);
    }

    #[test]
    fn unicode_whitespace_lines_collapse_in_one_pass() {
        let once = normalise("a\n\u{a0}\n\u{a0}\nb");
        assert_eq!(once, "a\n\nb");
        assert_eq!(normalise(&once), once);
    }

    #[test]
    fn front_matter_split() {
        let (front, body) = split_front_matter("---\ntitle: x\n---\n\nBody");
        assert_eq!(front, Some("---\ntitle: x\n---"));
        assert_eq!(body, "Body");

        let (front, body) = split_front_matter("--- not front matter");
        assert_eq!(front, None);
        assert_eq!(body, "--- not front matter");
    }

    #[test]
    fn title_heading_detection_ignores_code_and_subheadings() {
        assert!(has_title_heading("intro\n# Title"));
        assert!(!has_title_heading("## Sub\n```sh\n# comment\n```"));
        assert!(!has_title_heading("#hashtag"));
    }

    #[test]
    fn titles_from_file_names() {
        assert_eq!(title_from_file_name("a.md"), "A");
        assert_eq!(title_from_file_name("d/getting-started_guide.v2.md"), "Getting Started Guide V2");
        assert_eq!(title_from_file_name(".md"), "Md");
    }

    #[tokio::test]
    async fn missing_title_is_generated_after_front_matter() {
        let cap = Echo { title: "## \"Setup Guide\"" };
        let file = ProcessableFile::new(
            "docs/setup.md",
            b"---\nauthor: me\n---\n\nInstall it.\n\n\n\nDone.  ".to_vec(),
        );
        let out = clean(ctx(&cap), file).await;
        assert_eq!(
            out.cleaned,
            "---\nauthor: me\n---\n\n# Setup Guide\n\nInstall it.\n\nDone."
        );
        assert!(out.fallbacks.is_empty());
    }

    #[tokio::test]
    async fn offline_title_comes_from_file_stem() {
        let file = ProcessableFile::new("a.md", b"no heading here".to_vec());
        let out = clean(offline(), file).await;
        assert_eq!(out.cleaned, "# A\n\nno heading here");
        let stages: Vec<&str> = out.fallbacks.iter().map(|f| f.stage.as_str()).collect();
        assert_eq!(stages, vec!["generate_title", "fix_markdown"]);
    }

    #[tokio::test]
    async fn existing_title_is_kept_and_cleanup_is_idempotent() {
        let cap = Echo { title: "unused" };
        let file = ProcessableFile::new("e.md", b"  # Existing\n\n\n\nText   ".to_vec());
        let first = clean(ctx(&cap), file).await;
        assert_eq!(first.cleaned, "# Existing\n\nText");

        let again = clean(
            ctx(&cap),
            ProcessableFile::new("e.md", first.cleaned.clone().into_bytes()),
        )
        .await;
        assert_eq!(again.cleaned, first.cleaned);
    }
}

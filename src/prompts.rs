//! Prompts for the delegated LLM capabilities.
//!
//! Every prompt lives here so wording changes touch one file and tests can
//! inspect the exact text sent to the model. Each builder receives an already
//! truncated preview; truncation is the caller's job.

/// System prompt shared by every capability call.
pub const SYSTEM_PROMPT: &str = "You are a document preparation assistant. \
You clean up HTML, Markdown and word-processor content so it can be converted \
to DITA. Answer with the requested output only: no explanations, no \
commentary, no surrounding code fences.";

/// Ask for a structured classification of a preview.
pub fn classify_prompt(preview: &str, extension: &str) -> String {
    format!(
        r#"Analyze this document content and determine its type. Consider both the file extension "{extension}" and the actual content structure.

Content preview:
{preview}

Respond with exactly one of these types: "html", "markdown", or "docx".
Also identify any structural issues or cleanup needed.

Format your response as JSON:
{{
  "kind": "html|markdown|docx",
  "confidence": 0.0-1.0,
  "issues": ["list of issues found"],
  "recommendations": ["cleanup suggestions"]
}}"#
    )
}

/// Ask for an HTML syntax repair.
pub fn fix_markup_prompt(preview: &str) -> String {
    format!(
        "Fix HTML syntax issues in this content. Ensure proper tag closure, \
valid structure, and clean formatting:\n\n{preview}\n\n\
Return only the corrected HTML without explanations."
    )
}

/// Ask for a Markdown syntax repair.
pub fn fix_markdown_prompt(preview: &str) -> String {
    format!(
        "Fix markdown syntax issues in this content. Ensure proper formatting, \
valid structure, and clean markdown:\n\n{preview}\n\n\
Return only the corrected markdown without explanations."
    )
}

/// Ask for a restructuring of text extracted from a word-processor document.
pub fn restructure_prompt(preview: &str) -> String {
    format!(
        "Structure this DOCX-extracted content for better organization. Fix \
formatting issues and improve document structure:\n\n{preview}\n\n\
Return only the structured content without explanations."
    )
}

/// Ask for a short document title.
pub fn title_prompt(file_name: &str, preview: &str) -> String {
    format!(
        "Generate a concise title (at most 8 words) for a Markdown document \
named \"{file_name}\". Content preview:\n\n{preview}\n\n\
Return only the title text on a single line, without '#' or quotes."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prompt_embeds_extension_and_schema() {
        let p = classify_prompt("<p>hi</p>", ".html");
        assert!(p.contains("\".html\""));
        assert!(p.contains("<p>hi</p>"));
        assert!(p.contains("\"kind\": \"html|markdown|docx\""));
    }

    #[test]
    fn title_prompt_mentions_file_name() {
        let p = title_prompt("getting-started.md", "Install the tool");
        assert!(p.contains("getting-started.md"));
        assert!(p.contains("Install the tool"));
    }
}

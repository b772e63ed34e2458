//! Converts a raw model response into a clean `(title, content)` pair.
//!
//! The model is instructed to return a JSON object with `title` and
//! `content` fields but does not reliably comply. Normalization degrades
//! through three tiers (clean JSON, heading-like plain text, opaque blob)
//! and never fails; a poor title beats a failed request.

use serde_json::Value;

const GENERIC_TITLES: &[&str] = &["untitled", "story", "untitled story", "the story"];
const MAX_PROMPT_TITLE_LEN: usize = 60;
const MAX_HEADING_LEN: usize = 100;
const TITLE_WORDS: usize = 10;

pub fn normalize(raw: &str, prompt: &str, genre: &str) -> (String, String) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (synthesize_title(prompt, "", genre), String::new());
    }

    let unwrapped = strip_code_fence(trimmed);

    if unwrapped.starts_with('{') && unwrapped.ends_with('}') {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(unwrapped) {
            let title = obj
                .get("title")
                .or_else(|| obj.get("story_title"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string();
            let mut content = obj
                .get("content")
                .or_else(|| obj.get("story"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string();
            if content.is_empty() {
                // parse succeeded but the schema didn't match expectations
                content = unwrapped.to_string();
            }
            let title = if title.is_empty() || is_generic_title(&title) {
                synthesize_title(prompt, &content, genre)
            } else {
                title
            };
            return (title, content);
        }
        // parse failure falls through to the plain-text path
    }

    from_plain_text(unwrapped, prompt, genre)
}

/// Unwraps one surrounding triple-backtick fence, optionally tagged `json`.
fn strip_code_fence(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            let inner = inner.strip_prefix("json").unwrap_or(inner);
            return inner.trim();
        }
    }
    text
}

fn from_plain_text(text: &str, prompt: &str, genre: &str) -> (String, String) {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    if let Some(first) = lines.first() {
        if first.len() < MAX_HEADING_LEN && looks_like_heading(first) {
            let title = first.trim_start_matches('#').trim();
            let content = lines[1..].join("\n");
            let title = if title.is_empty() || is_generic_title(title) {
                synthesize_title(prompt, &content, genre)
            } else {
                title.to_string()
            };
            return (title, content);
        }
    }

    (synthesize_title(prompt, text, genre), text.to_string())
}

fn looks_like_heading(line: &str) -> bool {
    if line.starts_with('#') {
        return true;
    }
    let lower = line.to_lowercase();
    if lower.starts_with("chapter") || lower.starts_with("the ") {
        return true;
    }
    is_title_cased(line)
}

/// Every word that begins with a letter begins with an uppercase one.
fn is_title_cased(line: &str) -> bool {
    let mut saw_word = false;
    for word in line.split_whitespace() {
        if let Some(first) = word.chars().find(|c| c.is_alphabetic()) {
            saw_word = true;
            if !first.is_uppercase() {
                return false;
            }
        }
    }
    saw_word
}

fn is_generic_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    GENERIC_TITLES.iter().any(|g| *g == lower)
}

pub fn synthesize_title(prompt: &str, content: &str, genre: &str) -> String {
    let prompt = prompt.trim();
    if !prompt.is_empty() && prompt.len() < MAX_PROMPT_TITLE_LEN {
        return prompt.to_string();
    }

    let words: Vec<&str> = content.split_whitespace().take(TITLE_WORDS).collect();
    if words.len() >= 3 {
        return format!("{}...", words.join(" "));
    }

    format!("{} Story", capitalize(if genre.trim().is_empty() { "general" } else { genre }))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

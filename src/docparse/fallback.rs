use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::decode_entities;
use super::{DocKind, ParsedDoc, NO_TITLE};

static TITLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"title="([^"]+)""#).unwrap());
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Last-resort marker emitted when no tier produced any usable text.
pub const EXTRACTION_FAILED: &str = "텍스트 추출 실패";

/// Last resort: throw away all markup and synthesize a minimal readable
/// summary from sentence fragments longer than 10 characters. Always
/// succeeds; the text is never empty.
pub fn plain_text(raw: &str) -> ParsedDoc {
    let title = TITLE_ATTR_RE
        .captures(raw)
        .map(|c| decode_entities(&c[1]))
        .unwrap_or_else(|| NO_TITLE.to_string());

    let stripped = ANY_TAG_RE.replace_all(raw, " ");
    let decoded = decode_entities(&stripped);
    let flattened = WS_RUN_RE.replace_all(&decoded, " ");
    let flattened = flattened.trim();

    let sentences: Vec<String> = SENTENCE_END_RE
        .split(flattened)
        .map(str::trim)
        .filter(|s| s.chars().count() > 10)
        .map(|s| format!("{}.", s.trim_end_matches(['.', '!', '?'])))
        .collect();

    let header = format!("【{}】", title);
    let text = if sentences.is_empty() {
        format!("{}\n\n- {}", header, EXTRACTION_FAILED)
    } else {
        let items: Vec<String> = sentences.iter().map(|s| format!("- {}", s)).collect();
        format!("{}\n\n{}", header, items.join("\n"))
    };

    ParsedDoc {
        title,
        kind: DocKind::RawText,
        sections: None,
        text,
        error: None,
        raw: None,
    }
}

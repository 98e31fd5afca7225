use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::{breaks_to_spaces, clean_text, decode_entities, strip_cdata_markers, unwrap_inline};
use super::{DocKind, ParsedDoc, TierError, NO_TITLE};

static TITLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"title="([^"]+)""#).unwrap());
static ARTICLE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<ARTICLE title="([^"]+)""#).unwrap());
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<PARAGRAPH[^>]*>(.*?)</PARAGRAPH>").unwrap());

/// Pull titles and paragraphs straight out of the character stream, with no
/// parse tree at all. Section grouping is not reconstructed at this tier:
/// article titles come out as one block before all paragraphs, an accepted
/// divergence from the interleaved ordering of the structured tiers. Returns
/// [`TierError::Empty`] when nothing beyond the bare title was recovered.
pub fn salvage(raw: &str) -> Result<ParsedDoc, TierError> {
    let s = strip_cdata_markers(raw);
    let s = unwrap_inline(&s);
    let s = breaks_to_spaces(&s);

    let title = TITLE_ATTR_RE
        .captures(&s)
        .map(|c| decode_entities(&c[1]))
        .unwrap_or_else(|| NO_TITLE.to_string());

    let mut parts = vec![format!("【{}】", title)];

    for caps in ARTICLE_TITLE_RE.captures_iter(&s) {
        let t = decode_entities(caps[1].trim());
        if !t.is_empty() {
            parts.push(format!("\n■ {}", t));
        }
    }

    for caps in PARAGRAPH_RE.captures_iter(&s) {
        let p = clean_text(&caps[1]);
        if !p.is_empty() {
            parts.push(format!("- {}", p));
        }
    }

    if parts.len() == 1 {
        return Err(TierError::Empty);
    }

    Ok(ParsedDoc {
        title,
        kind: DocKind::Salvaged,
        sections: None,
        text: parts.join("\n"),
        error: None,
        raw: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_from_hopeless_nesting() {
        let raw = r#"<DOC title="주의사항"><SECTION><BAD><WORSE></SECTION><ARTICLE title="C"><PARAGRAPH>note</PARAGRAPH>"#;
        let doc = salvage(raw).unwrap();
        assert_eq!(doc.kind, DocKind::Salvaged);
        assert_eq!(doc.title, "주의사항");
        assert!(doc.text.contains("■ C"));
        assert!(doc.text.contains("- note"));
    }

    #[test]
    fn titles_block_precedes_paragraphs() {
        let raw = r#"<DOC title="T"><PARAGRAPH>p1</PARAGRAPH><ARTICLE title="A2"><PARAGRAPH>p2</PARAGRAPH>"#;
        let doc = salvage(raw).unwrap();
        assert!(doc.text.find("■ A2").unwrap() < doc.text.find("- p1").unwrap());
    }

    #[test]
    fn missing_title_defaults() {
        let raw = "<DOC><PARAGRAPH>장기 보관 금지</PARAGRAPH>";
        let doc = salvage(raw).unwrap();
        assert_eq!(doc.title, NO_TITLE);
    }

    #[test]
    fn nothing_recovered_is_empty() {
        assert!(matches!(
            salvage(r#"<DOC title="T"></DOC>"#),
            Err(TierError::Empty)
        ));
        assert!(matches!(salvage("마크업 없는 문장"), Err(TierError::Empty)));
    }

    #[test]
    fn paragraph_contents_cleaned() {
        let raw = r#"<DOC title="T"><PARAGRAPH><b>굵게</b>  표시 &amp; 강조</PARAGRAPH></PARAGRAPH>"#;
        let doc = salvage(raw).unwrap();
        assert!(doc.text.contains("- 굵게 표시 & 강조"));
    }
}

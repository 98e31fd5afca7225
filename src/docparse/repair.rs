use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::{breaks_to_spaces, escape_bare_ampersands, strip_cdata_markers, unwrap_inline};

static TAG_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9_]*)((?:[^>])*?)(/?)>").unwrap()
});

/// Second-chance preprocessing for documents the structured tier rejected.
/// CDATA semantics are abandoned (markers replaced by their raw text),
/// `<br>` becomes a space, the ampersand repair runs over the whole string,
/// and unterminated tags are closed so the structured parse can be
/// re-attempted once.
pub fn repair(sanitized: &str) -> String {
    let s = strip_cdata_markers(sanitized);
    let s = unwrap_inline(&s);
    let s = breaks_to_spaces(&s);
    let s = escape_bare_ampersands(&s);
    close_unterminated_tags(&s)
}

/// Append closing tags for every element opened but never closed, most
/// recently opened first.
fn close_unterminated_tags(s: &str) -> String {
    let mut open: Vec<&str> = Vec::new();
    for caps in TAG_TOKEN_RE.captures_iter(s) {
        let closing = !caps[1].is_empty();
        let self_closing = !caps[4].is_empty();
        let name = caps.get(2).unwrap();
        if self_closing {
            continue;
        }
        if closing {
            if let Some(pos) = open.iter().rposition(|n| *n == name.as_str()) {
                open.remove(pos);
            }
        } else {
            open.push(name.as_str());
        }
    }

    if open.is_empty() {
        return s.to_string();
    }
    let mut out = s.to_string();
    for name in open.iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docparse::structured::parse_structured;

    #[test]
    fn closes_single_unterminated_tag() {
        let s = close_unterminated_tags(r#"<DOC><SECTION><ARTICLE title="B"><PARAGRAPH>1일 1회</PARAGRAPH></ARTICLE></SECTION>"#);
        assert!(s.ends_with("</DOC>"));
    }

    #[test]
    fn closes_nested_tags_innermost_first() {
        let s = close_unterminated_tags(r#"<DOC><SECTION><ARTICLE title="B">"#);
        assert!(s.ends_with("</ARTICLE></SECTION></DOC>"));
    }

    #[test]
    fn self_closing_and_balanced_tags_ignored() {
        let s = r#"<DOC><SECTION/><SECTION title="S"></SECTION></DOC>"#;
        assert_eq!(close_unterminated_tags(s), s);
    }

    #[test]
    fn repaired_document_parses() {
        let raw = r#"<DOC title="T"><SECTION><ARTICLE title="B"><PARAGRAPH>복용 후 졸음"#;
        let tree = parse_structured(&repair(raw)).unwrap();
        assert_eq!(tree.sections[0].articles[0].title, "B");
        assert_eq!(tree.sections[0].articles[0].paragraphs, vec!["복용 후 졸음"]);
    }

    #[test]
    fn cdata_markers_discarded() {
        let raw = r#"<DOC title="T"><SECTION><ARTICLE title="A"><PARAGRAPH><![CDATA[소금 & 물]]></PARAGRAPH></ARTICLE></SECTION></DOC>"#;
        let repaired = repair(raw);
        assert!(!repaired.contains("CDATA"));
        assert!(repaired.contains("소금 &amp; 물"));
    }
}

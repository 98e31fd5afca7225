use std::sync::LazyLock;

use regex::Regex;

static SUB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<sub>(.*?)</sub>").unwrap());
static SUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<sup>(.*?)</sup>").unwrap());
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").unwrap());
static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").unwrap());
// A well-formed entity right after '&': named, decimal, or hex reference.
static ENTITY_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&(?:amp|lt|gt|apos|quot|#[0-9]+|#x[0-9a-fA-F]+);").unwrap());
static ENTITY_DECODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);").unwrap());

/// Make a raw upstream document field safe for an XML parser: unwrap
/// presentational `<sub>`/`<sup>` tags and escape bare ampersands without
/// touching entities that are already well-formed. CDATA payloads get the
/// same ampersand repair and are spliced back at their original position.
/// Never fails; running it twice yields the same output.
pub fn sanitize(raw: &str) -> String {
    let unwrapped = unwrap_inline(raw);

    let mut out = String::with_capacity(unwrapped.len());
    let mut last = 0;
    for caps in CDATA_RE.captures_iter(&unwrapped) {
        let whole = caps.get(0).unwrap();
        let inner = caps.get(1).unwrap().as_str();
        out.push_str(&escape_bare_ampersands(&unwrapped[last..whole.start()]));
        out.push_str("<![CDATA[");
        out.push_str(&escape_bare_ampersands(inner));
        out.push_str("]]>");
        last = whole.end();
    }
    out.push_str(&escape_bare_ampersands(&unwrapped[last..]));
    out
}

/// Replace `<sub>x</sub>` and `<sup>x</sup>` with their inner content.
pub fn unwrap_inline(s: &str) -> String {
    let s = SUB_RE.replace_all(s, "$1");
    SUP_RE.replace_all(&s, "$1").into_owned()
}

/// Convert `<br>` / `<br/>` to a single space.
pub fn breaks_to_spaces(s: &str) -> String {
    BR_RE.replace_all(s, " ").into_owned()
}

/// Escape every `&` that does not start a recognized entity. Already-escaped
/// entities pass through untouched, so the operation is idempotent.
pub fn escape_bare_ampersands(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        if ENTITY_AT_RE.is_match(&rest[pos..]) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = &rest[pos + 1..];
    }
    out.push_str(rest);
    out
}

/// Replace each CDATA block with its raw inner text.
pub fn strip_cdata_markers(s: &str) -> String {
    CDATA_RE.replace_all(s, "$1").into_owned()
}

/// Remove every tag-shaped `<...>` substring.
pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// Decode HTML/XML entities in a single pass: the five predefined names,
/// numeric references, and the handful of named entities that show up in
/// regulatory text.
pub fn decode_entities(s: &str) -> String {
    ENTITY_DECODE_RE
        .replace_all(s, |caps: &regex::Captures| {
            let body = &caps[1];
            if let Some(hex) = body.strip_prefix("#x") {
                return u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string());
            }
            if let Some(dec) = body.strip_prefix('#') {
                return dec
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string());
            }
            match body {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => " ".to_string(),
                "middot" => "·".to_string(),
                "times" => "×".to_string(),
                "deg" => "°".to_string(),
                "plusmn" => "±".to_string(),
                "ndash" => "–".to_string(),
                "mdash" => "—".to_string(),
                "hellip" => "…".to_string(),
                "rarr" => "→".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Paragraph post-processing shared by every extraction tier: residual CDATA
/// markers and tags removed, entities decoded, carriage returns dropped, tabs
/// converted to spaces, space runs collapsed, ends trimmed.
pub fn clean_text(s: &str) -> String {
    let s = strip_cdata_markers(s);
    let s = strip_tags(&s);
    let s = decode_entities(&s);
    let s = s.replace('\r', "").replace('\t', " ");
    let s = SPACE_RUN_RE.replace_all(&s, " ");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ampersand_escaped() {
        assert_eq!(escape_bare_ampersands("A & B"), "A &amp; B");
    }

    #[test]
    fn valid_entities_untouched() {
        let s = "A &amp; B &lt;= C &#40; &#x2F;";
        assert_eq!(escape_bare_ampersands(s), s);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let raw = r#"<DOC title="T"><![CDATA[salt & water]]> M&M</DOC>"#;
        let once = sanitize(raw);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
        assert!(once.contains("salt &amp; water"));
        assert!(once.contains("M&amp;M"));
    }

    #[test]
    fn cdata_payload_repaired_in_place() {
        let raw = "a<![CDATA[x & y]]>b<![CDATA[p &amp; q]]>c";
        assert_eq!(
            sanitize(raw),
            "a<![CDATA[x &amp; y]]>b<![CDATA[p &amp; q]]>c"
        );
    }

    #[test]
    fn sub_sup_unwrapped() {
        assert_eq!(unwrap_inline("H<sub>2</sub>O 10mm<sup>3</sup>"), "H2O 10mm3");
    }

    #[test]
    fn decode_named_and_numeric() {
        assert_eq!(decode_entities("&lt;1&nbsp;&amp;&nbsp;2&gt;"), "<1 & 2>");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn decode_is_single_pass() {
        // Matches html.unescape: "&amp;lt;" decodes to "&lt;", not "<".
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn clean_text_normalizes_whitespace() {
        let s = "  복용 전\t\t반드시   의사와\r 상의  ";
        assert_eq!(clean_text(s), "복용 전 반드시 의사와 상의");
    }

    #[test]
    fn clean_text_strips_markup() {
        let s = "<![CDATA[<p>성인 1회 1정</p>]]>";
        assert_eq!(clean_text(s), "성인 1회 1정");
    }

    #[test]
    fn clean_text_empty_after_processing() {
        assert_eq!(clean_text("  <br/> \r\t "), "");
    }
}

//! Resilient XML-to-text extraction for the regulatory document fields
//! (효능효과 / 용법용량 / 사용상의주의사항) embedded in approval records.
//!
//! Upstream fields arrive as XML fragments of wildly varying quality:
//! CDATA-wrapped markup, bare ampersands, truncated elements. Extraction is
//! an ordered chain of recovery tiers, each tried in turn until one
//! succeeds:
//!
//! 1. structured  — sanitize, then a real XML parse into a section tree
//! 2. recovered   — heuristic tag repair, then one structured re-attempt
//! 3. salvaged    — regex extraction straight off the character stream
//! 4. raw_text    — strip everything, keep sentence fragments
//!
//! [`extract`] cannot fail: every path ends in a [`ParsedDoc`] with
//! non-empty display text, and a panic anywhere inside is converted into a
//! `DocKind::Error` result carrying the truncated input for triage.

pub mod fallback;
pub mod render;
pub mod repair;
pub mod salvage;
pub mod sanitize;
pub mod structured;

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use structured::Section;

pub(crate) const NO_TITLE: &str = "제목 없음";

/// Which recovery tier produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Structured,
    Recovered,
    Salvaged,
    RawText,
    Error,
}

/// Normalized output of the extraction pipeline for one document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDoc {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DocKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Failure signal passed between tiers. Tiers never panic on malformed
/// input; they return this and the coordinator routes to the next tier.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("no root element")]
    NoRoot,
    #[error("document ends inside an open element")]
    Unterminated,
    #[error("no recoverable content")]
    Empty,
}

/// Run the full recovery chain on one raw document field.
///
/// Empty or whitespace-only input means "no document" and short-circuits to
/// `None` without invoking any tier. Otherwise this always returns a
/// document: the chain cannot throw, and the worst outcome is a `raw_text`
/// result carrying the extraction-failed marker.
pub fn extract(raw: &str) -> Option<ParsedDoc> {
    if raw.trim().is_empty() {
        return None;
    }
    Some(match catch_unwind(AssertUnwindSafe(|| run_tiers(raw))) {
        Ok(doc) => doc,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            warn!("extraction panicked: {}", msg);
            error_doc(raw, msg)
        }
    })
}

fn run_tiers(raw: &str) -> ParsedDoc {
    let sanitized = sanitize::sanitize(raw);

    match try_structured(&sanitized, DocKind::Structured) {
        Ok(doc) => return doc,
        Err(e) => warn!("structured parse failed, trying tag repair: {}", e),
    }

    let repaired = repair::repair(&sanitized);
    match try_structured(&repaired, DocKind::Recovered) {
        Ok(doc) => return doc,
        Err(e) => warn!("tag repair failed, trying regex salvage: {}", e),
    }

    // Tiers 3 and 4 read the repaired string: the appended closing tags
    // let the paragraph regex recover content from truncated documents.
    match salvage::salvage(&repaired) {
        Ok(doc) => doc,
        Err(_) => fallback::plain_text(&repaired),
    }
}

fn try_structured(xml: &str, kind: DocKind) -> Result<ParsedDoc, TierError> {
    let tree = structured::parse_structured(xml)?;
    let text = render::render_tree(&tree.title, &tree.sections);
    // A parse that recovered no text at all is not a success; let a later
    // tier synthesize something readable.
    if text.is_empty() {
        return Err(TierError::Empty);
    }
    Ok(ParsedDoc {
        title: tree.title,
        kind,
        sections: Some(tree.sections),
        text,
        error: None,
        raw: None,
    })
}

fn error_doc(raw: &str, msg: String) -> ParsedDoc {
    let raw_preview = if raw.chars().count() > 500 {
        let head: String = raw.chars().take(500).collect();
        format!("{}...", head)
    } else {
        raw.to_string()
    };
    ParsedDoc {
        title: "처리 오류".to_string(),
        kind: DocKind::Error,
        sections: None,
        text: format!("처리 오류: {}", msg),
        error: Some(msg),
        raw: Some(raw_preview),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

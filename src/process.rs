use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::warn;

use crate::docparse::{self, DocKind, ParsedDoc};
use crate::model::{ApprovalRecord, DisplayRecord, ErrorField, ErrorReportEntry};

/// Run the extraction pipeline over the three regulatory document fields of
/// one approval record. Fields that are absent or already parsed are left
/// alone.
pub fn parse_doc_fields(record: &mut ApprovalRecord) {
    if record.ee_doc_parsed.is_none() {
        record.ee_doc_parsed = docparse::extract(&record.ee_doc_data);
    }
    if record.ud_doc_parsed.is_none() {
        record.ud_doc_parsed = docparse::extract(&record.ud_doc_data);
    }
    if record.nb_doc_parsed.is_none() {
        record.nb_doc_parsed = docparse::extract(&record.nb_doc_data);
    }
}

pub struct ProcessOutcome {
    pub display: Vec<DisplayRecord>,
    pub report: Vec<ErrorReportEntry>,
    /// Records dropped by the quality gate.
    pub skipped: usize,
}

/// Turn raw approval records into display records: document texts pulled
/// from the parsed structures (re-extracting on the spot when a parse is
/// missing), a quality gate on the result, and a parse-error report entry
/// for every field that ended in an error document. Extraction is pure and
/// per-record, so records are processed in parallel chunks.
pub fn process_records(records: Vec<ApprovalRecord>) -> ProcessOutcome {
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut outcome = ProcessOutcome {
        display: Vec::with_capacity(records.len()),
        report: Vec::new(),
        skipped: 0,
    };

    for chunk in records.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|record| {
                let mut record = record.clone();
                parse_doc_fields(&mut record);
                let report = error_report_entry(&record);
                (to_display(record), report)
            })
            .collect();

        for (display, report) in results {
            match display {
                Some(d) => outcome.display.push(d),
                None => outcome.skipped += 1,
            }
            if let Some(entry) = report {
                outcome.report.push(entry);
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    if outcome.skipped > 0 {
        warn!("{} records had no meaningful content and were dropped", outcome.skipped);
    }
    outcome
}

fn doc_text(parsed: &Option<ParsedDoc>) -> String {
    parsed.as_ref().map(|d| d.text.clone()).unwrap_or_default()
}

fn to_display(record: ApprovalRecord) -> Option<DisplayRecord> {
    let display = DisplayRecord {
        item_seq: record.item_seq.clone(),
        item_name: record.item_name.clone(),
        entp_name: record.entp_name.clone(),
        etc_otc_name: record.etc_otc_name.clone(),
        chart: record.chart.clone(),
        storage_method: record.storage_method.trim().to_string(),
        valid_term: record.valid_term.clone(),
        effectiveness: doc_text(&record.ee_doc_parsed),
        usage_dosage: doc_text(&record.ud_doc_parsed),
        precautions: doc_text(&record.nb_doc_parsed),
    };

    let has_content = [
        &display.effectiveness,
        &display.usage_dosage,
        &display.precautions,
    ]
    .iter()
    .any(|t| t.chars().count() > 10);

    if has_content || (!display.item_name.is_empty() && !display.entp_name.is_empty()) {
        Some(display)
    } else {
        None
    }
}

fn error_report_entry(record: &ApprovalRecord) -> Option<ErrorReportEntry> {
    let mut error_fields = Vec::new();
    for (field, parsed) in [
        ("EE_DOC_DATA", &record.ee_doc_parsed),
        ("UD_DOC_DATA", &record.ud_doc_parsed),
        ("NB_DOC_DATA", &record.nb_doc_parsed),
    ] {
        if let Some(doc) = parsed {
            if doc.kind == DocKind::Error {
                error_fields.push(ErrorField {
                    field: field.to_string(),
                    error: doc
                        .error
                        .clone()
                        .unwrap_or_else(|| "알 수 없는 오류".to_string()),
                });
            }
        }
    }
    if error_fields.is_empty() {
        return None;
    }
    Some(ErrorReportEntry {
        item_seq: record.item_seq.clone(),
        item_name: record.item_name.clone(),
        error_fields,
    })
}

use std::collections::HashSet;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use super::{api_key, extract_items, get_page, str_field, PAGE_SIZE};
use crate::model::ApprovalRecord;
use crate::process::parse_doc_fields;

const BASE_URL: &str =
    "http://apis.data.go.kr/1471000/DrugPrdtPrmsnInfoService06/getDrugPrdtPrmsnDtlInq05";

/// Everything one fetch run produced, including the per-filter skip counts
/// (returned to the caller rather than accumulated globally).
pub struct ApprovalFetch {
    pub records: Vec<ApprovalRecord>,
    pub canceled: usize,
    pub export_only: usize,
}

/// Walk the approval feed page by page, skipping canceled and export-only
/// products, deduplicating on `ITEM_SEQ`, and running the document
/// extraction pipeline on each regulatory field as records arrive.
pub async fn fetch_approvals(max_pages: Option<usize>) -> Result<ApprovalFetch> {
    let key = api_key()?;
    let client = reqwest::Client::new();

    let mut records = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut canceled = 0usize;
    let mut export_only = 0usize;
    let mut page_no = 1usize;

    loop {
        let data = get_page(&client, BASE_URL, &key, page_no).await?;
        let Some(page) = extract_items(&data) else {
            info!("No items on page {}, stopping", page_no);
            break;
        };
        let page_len = page.items.len();

        let mut new_items = 0usize;
        for item in &page.items {
            let item_seq = str_field(item, "ITEM_SEQ");
            if item_seq.is_empty() || seen.contains(&item_seq) {
                continue;
            }

            if !str_field(item, "CANCEL_DATE").is_empty() {
                debug!(
                    "Skipping canceled product: {}",
                    str_field(item, "ITEM_NAME")
                );
                canceled += 1;
                continue;
            }
            let item_name = str_field(item, "ITEM_NAME");
            if item_name.contains("(수출용)") {
                debug!("Skipping export-only product: {}", item_name);
                export_only += 1;
                continue;
            }

            seen.insert(item_seq.clone());
            new_items += 1;

            let mut record = approval_from_value(item);
            parse_doc_fields(&mut record);
            records.push(record);
        }

        if new_items == 0 {
            info!("Page {} had no new items, stopping", page_no);
            break;
        }

        info!(
            "Page {}: {} new records ({} total; skipped {} canceled, {} export-only)",
            page_no,
            new_items,
            records.len(),
            canceled,
            export_only
        );

        if page.total_count > 0 {
            let estimated_pages = (page.total_count as usize).div_ceil(PAGE_SIZE);
            if page_no >= estimated_pages {
                info!("Reached last page ({}/{})", page_no, estimated_pages);
                break;
            }
        }
        if page_len < PAGE_SIZE {
            info!("Short page ({} items), assuming last page", page_len);
            break;
        }
        if let Some(max) = max_pages {
            if page_no >= max {
                info!("Page limit {} reached, stopping", max);
                break;
            }
        }

        page_no += 1;
    }

    Ok(ApprovalFetch {
        records,
        canceled,
        export_only,
    })
}

fn approval_from_value(item: &Value) -> ApprovalRecord {
    let mut record = ApprovalRecord {
        item_seq: str_field(item, "ITEM_SEQ"),
        item_name: str_field(item, "ITEM_NAME"),
        entp_name: str_field(item, "ENTP_NAME"),
        etc_otc_code: str_field(item, "ETC_OTC_CODE"),
        etc_otc_name: str_field(item, "ETC_OTC_NAME"),
        chart: str_field(item, "CHART"),
        ee_doc_data: str_field(item, "EE_DOC_DATA"),
        ud_doc_data: str_field(item, "UD_DOC_DATA"),
        nb_doc_data: str_field(item, "NB_DOC_DATA"),
        storage_method: str_field(item, "STORAGE_METHOD"),
        valid_term: str_field(item, "VALID_TERM"),
        cancel_date: str_field(item, "CANCEL_DATE"),
        ..Default::default()
    };
    // Some records carry only the classification code; fall back to it.
    if record.etc_otc_name.is_empty() && !record.etc_otc_code.is_empty() {
        record.etc_otc_name = record.etc_otc_code.clone();
    }
    record
}

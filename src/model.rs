use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::docparse::ParsedDoc;

/// One drug approval record from the permission-detail feed, with the three
/// regulatory document fields and their parsed siblings. Field names follow
/// the upstream API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalRecord {
    #[serde(rename = "ITEM_SEQ", default)]
    pub item_seq: String,
    #[serde(rename = "ITEM_NAME", default)]
    pub item_name: String,
    #[serde(rename = "ENTP_NAME", default)]
    pub entp_name: String,
    #[serde(rename = "ETC_OTC_CODE", default)]
    pub etc_otc_code: String,
    #[serde(rename = "ETC_OTC_NAME", default)]
    pub etc_otc_name: String,
    #[serde(rename = "CHART", default)]
    pub chart: String,
    #[serde(rename = "EE_DOC_DATA", default)]
    pub ee_doc_data: String,
    #[serde(rename = "UD_DOC_DATA", default)]
    pub ud_doc_data: String,
    #[serde(rename = "NB_DOC_DATA", default)]
    pub nb_doc_data: String,
    #[serde(rename = "STORAGE_METHOD", default)]
    pub storage_method: String,
    #[serde(rename = "VALID_TERM", default)]
    pub valid_term: String,
    #[serde(rename = "CANCEL_DATE", default)]
    pub cancel_date: String,
    #[serde(rename = "EE_DOC_DATA_PARSED", default, skip_serializing_if = "Option::is_none")]
    pub ee_doc_parsed: Option<ParsedDoc>,
    #[serde(rename = "UD_DOC_DATA_PARSED", default, skip_serializing_if = "Option::is_none")]
    pub ud_doc_parsed: Option<ParsedDoc>,
    #[serde(rename = "NB_DOC_DATA_PARSED", default, skip_serializing_if = "Option::is_none")]
    pub nb_doc_parsed: Option<ParsedDoc>,
}

/// One pill appearance record from the identification feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PillRecord {
    #[serde(rename = "ITEM_SEQ", default)]
    pub item_seq: String,
    #[serde(rename = "ITEM_NAME", default)]
    pub item_name: String,
    #[serde(rename = "ENTP_SEQ", default)]
    pub entp_seq: String,
    #[serde(rename = "ENTP_NAME", default)]
    pub entp_name: String,
    #[serde(rename = "CHART", default)]
    pub chart: String,
    #[serde(rename = "ITEM_IMAGE", default)]
    pub item_image: String,
    #[serde(rename = "PRINT_FRONT", default)]
    pub print_front: String,
    #[serde(rename = "PRINT_BACK", default)]
    pub print_back: String,
    #[serde(rename = "DRUG_SHAPE", default)]
    pub drug_shape: String,
    #[serde(rename = "COLOR_CLASS1", default)]
    pub color_class1: String,
    #[serde(rename = "COLOR_CLASS2", default)]
    pub color_class2: String,
    #[serde(rename = "LENG_LONG", default)]
    pub leng_long: String,
    #[serde(rename = "LENG_SHORT", default)]
    pub leng_short: String,
    #[serde(rename = "THICK", default)]
    pub thick: String,
    #[serde(rename = "CLASS_NO", default)]
    pub class_no: String,
    #[serde(rename = "CLASS_NAME", default)]
    pub class_name: String,
    #[serde(rename = "ETC_OTC_NAME", default)]
    pub etc_otc_name: String,
    #[serde(rename = "FORM_CODE_NAME", default)]
    pub form_code_name: String,
    #[serde(rename = "MARK_CODE_FRONT_ANAL", default)]
    pub mark_code_front_anal: String,
    #[serde(rename = "MARK_CODE_BACK_ANAL", default)]
    pub mark_code_back_anal: String,
}

/// Display-oriented approval record: metadata plus the rendered document
/// texts, ready for downstream consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayRecord {
    #[serde(rename = "ITEM_SEQ", default)]
    pub item_seq: String,
    #[serde(rename = "ITEM_NAME", default)]
    pub item_name: String,
    #[serde(rename = "ENTP_NAME", default)]
    pub entp_name: String,
    #[serde(rename = "ETC_OTC_NAME", default)]
    pub etc_otc_name: String,
    #[serde(rename = "CHART", default)]
    pub chart: String,
    #[serde(rename = "STORAGE_METHOD", default)]
    pub storage_method: String,
    #[serde(rename = "VALID_TERM", default)]
    pub valid_term: String,
    #[serde(rename = "EFFECTIVENESS", default)]
    pub effectiveness: String,
    #[serde(rename = "USAGE_DOSAGE", default)]
    pub usage_dosage: String,
    #[serde(rename = "PRECAUTIONS", default)]
    pub precautions: String,
}

/// Approval + pill appearance joined on `ITEM_SEQ`. Approval values win for
/// the fields both feeds carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub approval: DisplayRecord,
    #[serde(rename = "ENTP_SEQ", default)]
    pub entp_seq: String,
    #[serde(rename = "ITEM_IMAGE", default)]
    pub item_image: String,
    #[serde(rename = "PRINT_FRONT", default)]
    pub print_front: String,
    #[serde(rename = "PRINT_BACK", default)]
    pub print_back: String,
    #[serde(rename = "DRUG_SHAPE", default)]
    pub drug_shape: String,
    #[serde(rename = "COLOR_CLASS1", default)]
    pub color_class1: String,
    #[serde(rename = "COLOR_CLASS2", default)]
    pub color_class2: String,
    #[serde(rename = "LENG_LONG", default)]
    pub leng_long: String,
    #[serde(rename = "LENG_SHORT", default)]
    pub leng_short: String,
    #[serde(rename = "THICK", default)]
    pub thick: String,
    #[serde(rename = "CLASS_NO", default)]
    pub class_no: String,
    #[serde(rename = "CLASS_NAME", default)]
    pub class_name: String,
    #[serde(rename = "FORM_CODE_NAME", default)]
    pub form_code_name: String,
    #[serde(rename = "MARK_CODE_FRONT_ANAL", default)]
    pub mark_code_front_anal: String,
    #[serde(rename = "MARK_CODE_BACK_ANAL", default)]
    pub mark_code_back_anal: String,
    #[serde(rename = "_source")]
    pub source: String,
    #[serde(rename = "_matchType")]
    pub match_type: String,
}

/// Pill record with no matching approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedPill {
    #[serde(flatten)]
    pub record: PillRecord,
    #[serde(rename = "_source")]
    pub source: String,
    #[serde(rename = "_needsAdditionalInfo")]
    pub needs_additional_info: bool,
}

/// Approval record with no matching pill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedApproval {
    #[serde(flatten)]
    pub record: DisplayRecord,
    #[serde(rename = "_source")]
    pub source: String,
}

/// One entry of the parse-error report written next to the processed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReportEntry {
    #[serde(rename = "ITEM_SEQ")]
    pub item_seq: String,
    #[serde(rename = "ITEM_NAME")]
    pub item_name: String,
    pub error_fields: Vec<ErrorField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorField {
    pub field: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<ErrorReportEntry>,
}

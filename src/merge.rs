use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{DisplayRecord, MergedRecord, PillRecord, UnmatchedApproval, UnmatchedPill};

pub struct MergeOutcome {
    pub merged: Vec<MergedRecord>,
    pub unmatched_pills: Vec<UnmatchedPill>,
    pub unmatched_approvals: Vec<UnmatchedApproval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeAnalysis {
    #[serde(rename = "totalItems")]
    pub total_items: usize,
    #[serde(rename = "totalMerged")]
    pub total_merged: usize,
    #[serde(rename = "totalUnmatchedPills")]
    pub total_unmatched_pills: usize,
    #[serde(rename = "totalUnmatchedApprovals")]
    pub total_unmatched_approvals: usize,
    #[serde(rename = "matchRate")]
    pub match_rate: String,
    #[serde(rename = "actionNeeded")]
    pub action_needed: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

/// Drop records without an `ITEM_SEQ`, deduplicate on it, and trim the
/// shared descriptive fields. Order is preserved.
pub fn preprocess_approvals(records: Vec<DisplayRecord>) -> Vec<DisplayRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter_map(|mut r| {
            if r.item_seq.is_empty() {
                warn!("Approval record without ITEM_SEQ dropped");
                return None;
            }
            if !seen.insert(r.item_seq.clone()) {
                warn!("Duplicate approval ITEM_SEQ {} dropped", r.item_seq);
                return None;
            }
            r.item_name = r.item_name.trim().to_string();
            r.entp_name = r.entp_name.trim().to_string();
            r.chart = r.chart.trim().to_string();
            Some(r)
        })
        .collect()
}

/// Same validation for the pill set.
pub fn preprocess_pills(records: Vec<PillRecord>) -> Vec<PillRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter_map(|mut r| {
            if r.item_seq.is_empty() {
                warn!("Pill record without ITEM_SEQ dropped");
                return None;
            }
            if !seen.insert(r.item_seq.clone()) {
                warn!("Duplicate pill ITEM_SEQ {} dropped", r.item_seq);
                return None;
            }
            r.item_name = r.item_name.trim().to_string();
            r.entp_name = r.entp_name.trim().to_string();
            r.chart = r.chart.trim().to_string();
            Some(r)
        })
        .collect()
}

/// Join pills against approvals on `ITEM_SEQ`. Matched pairs become
/// [`MergedRecord`]s (approval values win for the shared fields, falling
/// back to the pill's when the approval's is empty); everything else lands
/// in the unmatched buckets, tagged with its provenance.
pub fn merge(approvals: Vec<DisplayRecord>, pills: Vec<PillRecord>) -> MergeOutcome {
    let approval_map: HashMap<String, DisplayRecord> = approvals
        .iter()
        .map(|r| (r.item_seq.clone(), r.clone()))
        .collect();
    let mut matched: HashSet<String> = HashSet::new();

    let mut merged = Vec::new();
    let mut unmatched_pills = Vec::new();

    for pill in pills {
        let Some(approval) = approval_map.get(&pill.item_seq) else {
            unmatched_pills.push(UnmatchedPill {
                record: pill,
                source: "pill_only".to_string(),
                needs_additional_info: true,
            });
            continue;
        };

        let mut base = approval.clone();
        if base.item_name.is_empty() {
            base.item_name = pill.item_name.clone();
        }
        if base.entp_name.is_empty() {
            base.entp_name = pill.entp_name.clone();
        }
        if base.chart.is_empty() {
            base.chart = pill.chart.clone();
        }
        if base.etc_otc_name.is_empty() {
            base.etc_otc_name = pill.etc_otc_name.clone();
        }
        matched.insert(pill.item_seq.clone());

        merged.push(MergedRecord {
            approval: base,
            entp_seq: pill.entp_seq,
            item_image: pill.item_image,
            print_front: pill.print_front,
            print_back: pill.print_back,
            drug_shape: pill.drug_shape,
            color_class1: pill.color_class1,
            color_class2: pill.color_class2,
            leng_long: pill.leng_long,
            leng_short: pill.leng_short,
            thick: pill.thick,
            class_no: pill.class_no,
            class_name: pill.class_name,
            form_code_name: pill.form_code_name,
            mark_code_front_anal: pill.mark_code_front_anal,
            mark_code_back_anal: pill.mark_code_back_anal,
            source: "both".to_string(),
            match_type: "exact_match_by_ITEM_SEQ".to_string(),
        });
    }

    let unmatched_approvals = approvals
        .into_iter()
        .filter(|r| !matched.contains(&r.item_seq))
        .map(|record| UnmatchedApproval {
            record,
            source: "approval_only".to_string(),
        })
        .collect();

    MergeOutcome {
        merged,
        unmatched_pills,
        unmatched_approvals,
    }
}

pub fn analyze(outcome: &MergeOutcome) -> MergeAnalysis {
    let total_merged = outcome.merged.len();
    let total_unmatched_pills = outcome.unmatched_pills.len();
    let total_unmatched_approvals = outcome.unmatched_approvals.len();
    let total_items = total_merged + total_unmatched_pills + total_unmatched_approvals;
    let match_rate = if total_items > 0 {
        total_merged as f64 / total_items as f64 * 100.0
    } else {
        0.0
    };
    let action_needed = if total_unmatched_pills > 0 {
        format!(
            "낱알 의약품 중 {}개 항목에 대한 추가 정보 입력 필요",
            total_unmatched_pills
        )
    } else {
        "모든 낱알 의약품 정보가 매칭되었습니다.".to_string()
    };

    MergeAnalysis {
        total_items,
        total_merged,
        total_unmatched_pills,
        total_unmatched_approvals,
        match_rate: format!("{:.2}%", match_rate),
        action_needed,
        generated_at: Utc::now(),
    }
}

pub fn log_analysis(analysis: &MergeAnalysis) {
    info!("=== 병합 결과 분석 ===");
    info!("total items: {}", analysis.total_items);
    info!("merged: {}", analysis.total_merged);
    info!("unmatched pills: {}", analysis.total_unmatched_pills);
    info!("unmatched approvals: {}", analysis.total_unmatched_approvals);
    info!("match rate: {}", analysis.match_rate);
    info!("{}", analysis.action_needed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(seq: &str, name: &str) -> DisplayRecord {
        DisplayRecord {
            item_seq: seq.to_string(),
            item_name: name.to_string(),
            entp_name: "제약사".to_string(),
            ..Default::default()
        }
    }

    fn pill(seq: &str, name: &str) -> PillRecord {
        PillRecord {
            item_seq: seq.to_string(),
            item_name: name.to_string(),
            drug_shape: "원형".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn exact_match_joins_both_sides() {
        let outcome = merge(vec![approval("1", "타이레놀")], vec![pill("1", "")]);
        assert_eq!(outcome.merged.len(), 1);
        assert!(outcome.unmatched_pills.is_empty());
        assert!(outcome.unmatched_approvals.is_empty());
        let m = &outcome.merged[0];
        assert_eq!(m.approval.item_name, "타이레놀");
        assert_eq!(m.drug_shape, "원형");
        assert_eq!(m.source, "both");
        assert_eq!(m.match_type, "exact_match_by_ITEM_SEQ");
    }

    #[test]
    fn approval_fields_win_with_pill_fallback() {
        let mut a = approval("1", "");
        a.chart = String::new();
        let mut p = pill("1", "낱알이름");
        p.chart = "흰색의 원형 정제".to_string();
        let outcome = merge(vec![a], vec![p]);
        let m = &outcome.merged[0];
        assert_eq!(m.approval.item_name, "낱알이름");
        assert_eq!(m.approval.chart, "흰색의 원형 정제");
    }

    #[test]
    fn unmatched_records_are_tagged() {
        let outcome = merge(vec![approval("1", "a")], vec![pill("2", "p")]);
        assert!(outcome.merged.is_empty());
        assert_eq!(outcome.unmatched_pills.len(), 1);
        assert_eq!(outcome.unmatched_pills[0].source, "pill_only");
        assert!(outcome.unmatched_pills[0].needs_additional_info);
        assert_eq!(outcome.unmatched_approvals.len(), 1);
        assert_eq!(outcome.unmatched_approvals[0].source, "approval_only");
    }

    #[test]
    fn preprocess_dedups_and_trims() {
        let records = vec![
            approval("1", "  이름  "),
            approval("1", "중복"),
            approval("", "무번호"),
        ];
        let cleaned = preprocess_approvals(records);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].item_name, "이름");
    }

    #[test]
    fn analysis_match_rate() {
        let outcome = merge(
            vec![approval("1", "a"), approval("2", "b")],
            vec![pill("1", "p"), pill("3", "q")],
        );
        let analysis = analyze(&outcome);
        assert_eq!(analysis.total_items, 3);
        assert_eq!(analysis.total_merged, 1);
        assert_eq!(analysis.match_rate, "33.33%");
        assert!(analysis.action_needed.contains("1개"));
    }
}

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::model::{DisplayRecord, PillRecord};

const SEARCH_URL: &str = "https://nedrug.mfds.go.kr/searchDrug";
const NO_RESULT_MSG: &str = "조회 결과가 없습니다.";
const REQUEST_TIMEOUT_SECS: u64 = 10;

static DETAIL_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<table[^>]*class="[^"]*dr_table2[^"]*"[^>]*>(.*?)</table>"#).unwrap()
});

/// Anything with an `ITEM_SEQ` can be checked against the nedrug portal.
pub trait RegistryItem: Clone + Send + 'static {
    fn item_seq(&self) -> &str;
    fn item_name(&self) -> &str;
}

impl RegistryItem for DisplayRecord {
    fn item_seq(&self) -> &str {
        &self.item_seq
    }
    fn item_name(&self) -> &str {
        &self.item_name
    }
}

impl RegistryItem for PillRecord {
    fn item_seq(&self) -> &str {
        &self.item_seq
    }
    fn item_name(&self) -> &str {
        &self.item_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Registered,
    NotRegistered,
    Unknown,
    MissingId,
    Failed,
}

#[derive(Debug, Default, Clone)]
pub struct FilterStats {
    pub total: usize,
    pub registered: usize,
    pub not_registered: usize,
    pub unknown: usize,
    pub missing_id: usize,
    pub failed: usize,
}

impl FilterStats {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Registered => self.registered += 1,
            CheckOutcome::NotRegistered => self.not_registered += 1,
            CheckOutcome::Unknown => self.unknown += 1,
            CheckOutcome::MissingId => self.missing_id += 1,
            CheckOutcome::Failed => self.failed += 1,
        }
    }
}

/// Classify the portal's search response for a single item.
///
/// The "no results" banner means the item was withdrawn from the registry.
/// A detail table whose rows link to `getItemDetail` confirms an active
/// registration. Anything else is an unrecognized page layout.
pub fn classify(html: &str) -> CheckOutcome {
    if html.contains(NO_RESULT_MSG) {
        return CheckOutcome::NotRegistered;
    }
    if let Some(caps) = DETAIL_TABLE_RE.captures(html) {
        if caps[1].contains("getItemDetail?itemSeq=") {
            return CheckOutcome::Registered;
        }
    }
    CheckOutcome::Unknown
}

fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent("Mozilla/5.0")
        .build()
        .context("HTTP 클라이언트 생성 실패")
}

async fn check_item(client: &reqwest::Client, item_seq: &str) -> CheckOutcome {
    let resp = client
        .get(SEARCH_URL)
        .query(&[("searchYn", "true"), ("itemSeq", item_seq)])
        .send()
        .await;
    let html = match resp {
        Ok(r) => match r.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!("ITEM_SEQ {} 응답 본문 읽기 실패: {}", item_seq, e);
                return CheckOutcome::Failed;
            }
        },
        Err(e) => {
            warn!("ITEM_SEQ {} 조회 요청 실패: {}", item_seq, e);
            return CheckOutcome::Failed;
        }
    };
    classify(&html)
}

/// Whether a record with this outcome stays in the filtered set. Only a
/// confirmed registration keeps a record; timeouts and network errors count
/// as non-registration, same as a withdrawn item.
pub fn is_kept(outcome: CheckOutcome) -> bool {
    matches!(outcome, CheckOutcome::Registered)
}

/// Keep only records confirmed present in the registry. Requests run in
/// batches so the portal is not hammered; a failed request excludes its
/// record without ever aborting the batch.
pub async fn filter_registered<T: RegistryItem>(
    records: Vec<T>,
    batch_size: usize,
) -> Result<(Vec<T>, FilterStats)> {
    let client = client()?;
    let mut stats = FilterStats {
        total: records.len(),
        ..Default::default()
    };
    let mut kept = Vec::with_capacity(records.len());

    let bar = ProgressBar::new(records.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    for batch in records.chunks(batch_size) {
        let mut set: JoinSet<(usize, CheckOutcome)> = JoinSet::new();
        for (i, record) in batch.iter().enumerate() {
            let seq = record.item_seq().to_string();
            if seq.is_empty() {
                set.spawn(async move { (i, CheckOutcome::MissingId) });
                continue;
            }
            let client = client.clone();
            set.spawn(async move { (i, check_item(&client, &seq).await) });
        }

        let mut outcomes = vec![CheckOutcome::Failed; batch.len()];
        while let Some(joined) = set.join_next().await {
            let (i, outcome) = joined.context("조회 작업 실행 실패")?;
            outcomes[i] = outcome;
        }

        for (record, outcome) in batch.iter().zip(outcomes) {
            stats.record(outcome);
            if is_kept(outcome) {
                kept.push(record.clone());
                continue;
            }
            let reason = match outcome {
                CheckOutcome::NotRegistered => "취하 품목",
                CheckOutcome::Unknown => "조회 결과 불명",
                CheckOutcome::MissingId => "ITEM_SEQ 없음",
                _ => "조회 실패",
            };
            debug!(
                "{}으로 제외: {} ({})",
                reason,
                record.item_name(),
                record.item_seq()
            );
        }
        bar.inc(batch.len() as u64);
    }
    bar.finish();

    info!(
        "등록 확인 완료: {}건 중 등록 {} / 취하 {} / 불명 {} / 번호없음 {} / 실패 {}",
        stats.total,
        stats.registered,
        stats.not_registered,
        stats.unknown,
        stats.missing_id,
        stats.failed
    );
    Ok((kept, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_result_banner_means_withdrawn() {
        let html = "<html><body><p>조회 결과가 없습니다.</p></body></html>";
        assert_eq!(classify(html), CheckOutcome::NotRegistered);
    }

    #[test]
    fn detail_table_with_item_link_means_registered() {
        let html = r#"<html><table class="dr_table2" summary="검색결과">
            <tr><td><a href="/searchDrug/getItemDetail?itemSeq=200301427">타이레놀</a></td></tr>
        </table></html>"#;
        assert_eq!(classify(html), CheckOutcome::Registered);
    }

    #[test]
    fn detail_table_without_link_is_unknown() {
        let html = r#"<table class="dr_table2"><tr><td>비어 있음</td></tr></table>"#;
        assert_eq!(classify(html), CheckOutcome::Unknown);
    }

    #[test]
    fn unrecognized_page_is_unknown() {
        assert_eq!(classify("<html><body>점검 중</body></html>"), CheckOutcome::Unknown);
    }

    #[test]
    fn only_confirmed_registrations_are_kept() {
        assert!(is_kept(CheckOutcome::Registered));
        assert!(!is_kept(CheckOutcome::NotRegistered));
        assert!(!is_kept(CheckOutcome::Unknown));
        assert!(!is_kept(CheckOutcome::MissingId));
        // A timeout or network error counts as non-registration too.
        assert!(!is_kept(CheckOutcome::Failed));
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = FilterStats::default();
        stats.record(CheckOutcome::Registered);
        stats.record(CheckOutcome::Registered);
        stats.record(CheckOutcome::Failed);
        assert_eq!(stats.registered, 2);
        assert_eq!(stats.failed, 1);
    }
}

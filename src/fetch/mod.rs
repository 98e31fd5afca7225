pub mod approvals;
pub mod pills;

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

pub const PAGE_SIZE: usize = 100;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Open-data portal key, loaded from the environment (a `.env` file is read
/// at startup).
pub fn api_key() -> Result<String> {
    std::env::var("DATA_PORTAL_API_KEY")
        .context("DATA_PORTAL_API_KEY environment variable must be set")
}

/// Items of one page plus the feed's reported total, extracted from either
/// of the two envelope shapes the portal serves (`{header, body}` and
/// `{response: {body}}`). `None` means the page carried no items.
pub struct PageItems {
    pub items: Vec<Value>,
    pub total_count: u64,
}

/// Fetch one page of a feed as JSON, retrying transient failures with
/// exponential backoff.
pub async fn get_page(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    page_no: usize,
) -> Result<Value> {
    let mut last_err = None;
    for attempt in 0..MAX_RETRIES {
        let result = client
            .get(base_url)
            .query(&[
                ("serviceKey", api_key),
                ("pageNo", &page_no.to_string()),
                ("numOfRows", &PAGE_SIZE.to_string()),
                ("type", "json"),
            ])
            .send()
            .await;

        match result {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.json::<Value>().await {
                    Ok(value) => return Ok(value),
                    Err(e) => last_err = Some(anyhow::Error::from(e).context("invalid JSON body")),
                },
                Err(e) => last_err = Some(anyhow::Error::from(e)),
            },
            Err(e) => last_err = Some(anyhow::Error::from(e)),
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Page {} request failed (attempt {}/{}), backing off {:.1}s",
            page_no,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("request failed"))
        .context(format!("giving up on page {}", page_no)))
}

/// Unwrap the portal's response envelope and normalize `items` to a list
/// (single-record pages arrive as a bare object).
pub fn extract_items(data: &Value) -> Option<PageItems> {
    let body = if data.get("header").is_some() && data.get("body").is_some() {
        data.get("body")?
    } else {
        data.get("response")?.get("body")?
    };

    let items = match body.get("items")? {
        Value::Array(list) if !list.is_empty() => list.clone(),
        object @ Value::Object(_) => vec![object.clone()],
        _ => return None,
    };

    let total_count = match body.get("totalCount") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    };

    Some(PageItems { items, total_count })
}

/// String value of one record field; numbers are stringified and anything
/// else becomes empty, matching the portal's loose typing.
pub fn str_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_envelope() {
        let data = json!({
            "header": {"resultCode": "00"},
            "body": {"items": [{"ITEM_SEQ": "1"}], "totalCount": 42}
        });
        let page = extract_items(&data).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_count, 42);
    }

    #[test]
    fn nested_envelope() {
        let data = json!({
            "response": {"body": {"items": [{"a": 1}, {"a": 2}], "totalCount": "2"}}
        });
        let page = extract_items(&data).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn single_object_items() {
        let data = json!({
            "header": {}, "body": {"items": {"ITEM_SEQ": "1"}, "totalCount": 1}
        });
        assert_eq!(extract_items(&data).unwrap().items.len(), 1);
    }

    #[test]
    fn empty_or_missing_items() {
        assert!(extract_items(&json!({"header": {}, "body": {"items": []}})).is_none());
        assert!(extract_items(&json!({"header": {}, "body": {}})).is_none());
        assert!(extract_items(&json!({"unexpected": true})).is_none());
    }

    #[test]
    fn loose_field_typing() {
        let item = json!({"ITEM_SEQ": 200808876, "ITEM_NAME": "젤콤정", "NULLED": null});
        assert_eq!(str_field(&item, "ITEM_SEQ"), "200808876");
        assert_eq!(str_field(&item, "ITEM_NAME"), "젤콤정");
        assert_eq!(str_field(&item, "NULLED"), "");
        assert_eq!(str_field(&item, "ABSENT"), "");
    }
}

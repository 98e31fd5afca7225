use anyhow::Result;
use serde_json::Value;
use tracing::info;

use super::{api_key, extract_items, get_page, str_field, PAGE_SIZE};
use crate::model::PillRecord;

const BASE_URL: &str =
    "http://apis.data.go.kr/1471000/MdcinGrnIdntfcInfoService01/getMdcinGrnIdntfcInfoList01";

/// Walk the pill identification feed page by page, keeping the appearance
/// fields.
pub async fn fetch_pills(max_pages: Option<usize>) -> Result<Vec<PillRecord>> {
    let key = api_key()?;
    let client = reqwest::Client::new();

    let mut records = Vec::new();
    let mut page_no = 1usize;

    loop {
        let data = get_page(&client, BASE_URL, &key, page_no).await?;
        let Some(page) = extract_items(&data) else {
            info!("No items on page {}, stopping", page_no);
            break;
        };

        let page_len = page.items.len();
        records.extend(page.items.iter().map(pill_from_value));
        info!("Page {}: {} records ({} total)", page_no, page_len, records.len());

        if page.total_count > 0 && page_no * PAGE_SIZE >= page.total_count as usize {
            info!("Retrieved all {} records", page.total_count);
            break;
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

    Ok(records)
}

fn pill_from_value(item: &Value) -> PillRecord {
    PillRecord {
        item_seq: str_field(item, "ITEM_SEQ"),
        item_name: str_field(item, "ITEM_NAME"),
        entp_seq: str_field(item, "ENTP_SEQ"),
        entp_name: str_field(item, "ENTP_NAME"),
        chart: str_field(item, "CHART"),
        item_image: str_field(item, "ITEM_IMAGE"),
        print_front: str_field(item, "PRINT_FRONT"),
        print_back: str_field(item, "PRINT_BACK"),
        drug_shape: str_field(item, "DRUG_SHAPE"),
        color_class1: str_field(item, "COLOR_CLASS1"),
        color_class2: str_field(item, "COLOR_CLASS2"),
        leng_long: str_field(item, "LENG_LONG"),
        leng_short: str_field(item, "LENG_SHORT"),
        thick: str_field(item, "THICK"),
        class_no: str_field(item, "CLASS_NO"),
        class_name: str_field(item, "CLASS_NAME"),
        etc_otc_name: str_field(item, "ETC_OTC_NAME"),
        form_code_name: str_field(item, "FORM_CODE_NAME"),
        mark_code_front_anal: str_field(item, "MARK_CODE_FRONT_ANAL"),
        mark_code_back_anal: str_field(item, "MARK_CODE_BACK_ANAL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appearance_fields_kept() {
        let item = json!({
            "ITEM_SEQ": "200808876",
            "ITEM_NAME": "타이레놀정500밀리그람",
            "DRUG_SHAPE": "장방형",
            "COLOR_CLASS1": "하양",
            "PRINT_FRONT": "TYLENOL",
            "LENG_LONG": 17.2
        });
        let record = pill_from_value(&item);
        assert_eq!(record.drug_shape, "장방형");
        assert_eq!(record.print_front, "TYLENOL");
        assert_eq!(record.leng_long, "17.2");
        assert!(record.mark_code_back_anal.is_empty());
    }
}

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::super::intervals::derive_validity_ends;
use super::super::rules::{self, PRODUCT_LINE};
use super::super::{latest_per_key, Candidate, ConformContext, ConformOutput, Conformer, Defects};
use crate::common::constants::{CRM_PRODUCTS, NOT_AVAILABLE};
use crate::common::error::Result;
use crate::domain::{CrmProduct, RawRecord};

const CATEGORY_PREFIX_WIDTH: usize = 5;
const PRODUCT_NUMBER_OFFSET: usize = 6;

/// Split a CRM product key such as `CO-RF-FR-R92B-58` into the ERP category id
/// (`CO_RF`) and the product number (`FR-R92B-58`). Keys too short to carry
/// both parts keep the whole key as product number.
pub fn split_product_key(key: &str) -> (String, String) {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= PRODUCT_NUMBER_OFFSET {
        return (NOT_AVAILABLE.to_string(), key.trim().to_string());
    }
    let category: String = chars[..CATEGORY_PREFIX_WIDTH]
        .iter()
        .map(|c| if *c == '-' { '_' } else { *c })
        .collect();
    let number: String = chars[PRODUCT_NUMBER_OFFSET..].iter().collect();
    (category, number)
}

/// CRM product versions. Keyed by `prd_id`; validity end dates are derived per
/// product number rather than taken from the source.
pub struct CrmProductConformer;

impl Conformer for CrmProductConformer {
    fn relation(&self) -> &'static str {
        CRM_PRODUCTS
    }

    fn conform(&self, records: Vec<RawRecord>, _ctx: &ConformContext) -> Result<ConformOutput> {
        let rows_in = records.len();
        let mut defects = Defects::default();
        let mut candidates: Vec<Candidate<i64, NaiveDate, CrmProduct>> = Vec::with_capacity(rows_in);

        for raw in &records {
            let Some(product_id) = defects.track_key("prd_id", rules::integer(raw.get("prd_id"))) else {
                continue;
            };
            let (category_id, product_number) = match rules::text(raw.get("prd_key")) {
                Some(key) => split_product_key(&key),
                None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
            };
            let start_date = defects.track("prd_start_dt", rules::date(raw.get("prd_start_dt")));

            let product = CrmProduct {
                product_id,
                category_id,
                product_number,
                product_name: rules::text_or(raw.get("prd_nm"), NOT_AVAILABLE),
                cost: defects
                    .track("prd_cost", rules::decimal(raw.get("prd_cost")))
                    .unwrap_or(Decimal::ZERO),
                product_line: defects.track_code("prd_line", PRODUCT_LINE.lookup(raw.get("prd_line"))),
                start_date,
                end_date: None,
            };
            candidates.push(Candidate {
                key: product_id,
                recency: start_date,
                row_number: raw.row_number,
                record: product,
            });
        }

        let mut deduped = latest_per_key(candidates);
        derive_validity_ends(&mut deduped.records);
        ConformOutput::from_records(CRM_PRODUCTS, rows_in, deduped, defects)
    }
}

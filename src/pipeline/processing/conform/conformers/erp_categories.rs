use chrono::NaiveDate;

use super::super::rules::{self, MAINTENANCE};
use super::super::{latest_per_key, Candidate, ConformContext, ConformOutput, Conformer, DefectKind, Defects};
use crate::common::constants::{ERP_CATEGORIES, NOT_AVAILABLE};
use crate::common::error::Result;
use crate::domain::{ErpCategory, RawRecord};

/// ERP product category reference data
pub struct ErpCategoryConformer;

impl Conformer for ErpCategoryConformer {
    fn relation(&self) -> &'static str {
        ERP_CATEGORIES
    }

    fn conform(&self, records: Vec<RawRecord>, _ctx: &ConformContext) -> Result<ConformOutput> {
        let rows_in = records.len();
        let mut defects = Defects::default();
        let mut candidates: Vec<Candidate<String, NaiveDate, ErpCategory>> = Vec::with_capacity(rows_in);

        for raw in &records {
            let Some(category_id) = rules::text(raw.get("id")) else {
                defects.note("id", DefectKind::MissingKey);
                continue;
            };
            let category = ErpCategory {
                category_id: category_id.clone(),
                category: rules::text_or(raw.get("cat"), NOT_AVAILABLE),
                subcategory: rules::text_or(raw.get("subcat"), NOT_AVAILABLE),
                maintenance: defects.track_code("maintenance", MAINTENANCE.lookup(raw.get("maintenance"))),
            };
            candidates.push(Candidate {
                key: category_id,
                recency: None,
                row_number: raw.row_number,
                record: category,
            });
        }

        ConformOutput::from_records(ERP_CATEGORIES, rows_in, latest_per_key(candidates), defects)
    }
}

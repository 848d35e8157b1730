use chrono::NaiveDate;

use super::super::rules::{self, COUNTRY};
use super::super::{latest_per_key, Candidate, ConformContext, ConformOutput, Conformer, DefectKind, Defects};
use crate::common::constants::ERP_LOCATIONS;
use crate::common::error::Result;
use crate::domain::{ErpLocation, RawRecord};

/// ERP customer locations, country codes expanded to names
pub struct ErpLocationConformer;

impl Conformer for ErpLocationConformer {
    fn relation(&self) -> &'static str {
        ERP_LOCATIONS
    }

    fn conform(&self, records: Vec<RawRecord>, _ctx: &ConformContext) -> Result<ConformOutput> {
        let rows_in = records.len();
        let mut defects = Defects::default();
        let mut candidates: Vec<Candidate<String, NaiveDate, ErpLocation>> = Vec::with_capacity(rows_in);

        for raw in &records {
            let Some(customer_number) = rules::text(raw.get("cid")) else {
                defects.note("cid", DefectKind::MissingKey);
                continue;
            };
            let location = ErpLocation {
                customer_number: customer_number.clone(),
                country: defects.track_code("cntry", COUNTRY.lookup(raw.get("cntry"))),
            };
            candidates.push(Candidate {
                key: customer_number,
                recency: None,
                row_number: raw.row_number,
                record: location,
            });
        }

        ConformOutput::from_records(ERP_LOCATIONS, rows_in, latest_per_key(candidates), defects)
    }
}

use chrono::NaiveDate;

use super::super::rules::{self, ERP_GENDER};
use super::super::{latest_per_key, Candidate, ConformContext, ConformOutput, Conformer, DefectKind, Defects};
use crate::common::constants::ERP_CUSTOMERS;
use crate::common::error::Result;
use crate::domain::{ErpCustomer, RawRecord};

/// ERP customer demographics. Keyed by `cid` as delivered; prefix stripping
/// happens at match time in the modeling engine.
pub struct ErpCustomerConformer;

impl Conformer for ErpCustomerConformer {
    fn relation(&self) -> &'static str {
        ERP_CUSTOMERS
    }

    fn conform(&self, records: Vec<RawRecord>, ctx: &ConformContext) -> Result<ConformOutput> {
        let rows_in = records.len();
        let mut defects = Defects::default();
        let mut candidates: Vec<Candidate<String, NaiveDate, ErpCustomer>> = Vec::with_capacity(rows_in);

        for raw in &records {
            let Some(customer_number) = rules::text(raw.get("cid")) else {
                defects.note("cid", DefectKind::MissingKey);
                continue;
            };

            let mut birth_date = defects.track("bdate", rules::date(raw.get("bdate")));
            if birth_date.map_or(false, |d| d > ctx.run_date) {
                defects.note("bdate", DefectKind::FutureDate);
                birth_date = None;
            }

            let customer = ErpCustomer {
                customer_number: customer_number.clone(),
                birth_date,
                gender: defects.track_code("gen", ERP_GENDER.lookup(raw.get("gen"))),
            };
            candidates.push(Candidate {
                key: customer_number,
                recency: None,
                row_number: raw.row_number,
                record: customer,
            });
        }

        ConformOutput::from_records(ERP_CUSTOMERS, rows_in, latest_per_key(candidates), defects)
    }
}

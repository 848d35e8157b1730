use chrono::NaiveDate;

use super::super::rules::{self, CRM_GENDER, MARITAL_STATUS};
use super::super::{latest_per_key, Candidate, ConformContext, ConformOutput, Conformer, Defects};
use crate::common::constants::{CRM_CUSTOMERS, NOT_AVAILABLE};
use crate::common::error::Result;
use crate::domain::{CrmCustomer, RawRecord};

/// CRM customer master. Keyed by `cst_id`; the latest `cst_create_date` wins.
pub struct CrmCustomerConformer;

impl Conformer for CrmCustomerConformer {
    fn relation(&self) -> &'static str {
        CRM_CUSTOMERS
    }

    fn conform(&self, records: Vec<RawRecord>, _ctx: &ConformContext) -> Result<ConformOutput> {
        let rows_in = records.len();
        let mut defects = Defects::default();
        let mut candidates: Vec<Candidate<i64, NaiveDate, CrmCustomer>> = Vec::with_capacity(rows_in);

        for raw in &records {
            let Some(customer_id) = defects.track_key("cst_id", rules::integer(raw.get("cst_id"))) else {
                continue;
            };
            let created_on = defects.track("cst_create_date", rules::date(raw.get("cst_create_date")));

            let customer = CrmCustomer {
                customer_id,
                customer_number: rules::text_or(raw.get("cst_key"), NOT_AVAILABLE),
                first_name: rules::text_or(raw.get("cst_firstname"), NOT_AVAILABLE),
                last_name: rules::text_or(raw.get("cst_lastname"), NOT_AVAILABLE),
                marital_status: defects.track_code(
                    "cst_marital_status",
                    MARITAL_STATUS.lookup(raw.get("cst_marital_status")),
                ),
                gender: defects.track_code("cst_gndr", CRM_GENDER.lookup(raw.get("cst_gndr"))),
                created_on,
            };
            candidates.push(Candidate {
                key: customer_id,
                recency: created_on,
                row_number: raw.row_number,
                record: customer,
            });
        }

        ConformOutput::from_records(CRM_CUSTOMERS, rows_in, latest_per_key(candidates), defects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::conform::DefectKind;
    use serde_json::json;

    fn ctx() -> ConformContext {
        ConformContext {
            run_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    fn conform(rows: Vec<serde_json::Value>) -> (Vec<CrmCustomer>, ConformOutput) {
        let raw = rows
            .into_iter()
            .enumerate()
            .map(|(i, v)| RawRecord::from_value(i as u64 + 1, v))
            .collect();
        let output = CrmCustomerConformer.conform(raw, &ctx()).unwrap();
        let customers = output
            .rows
            .iter()
            .map(|r| serde_json::from_value(r.clone()).unwrap())
            .collect();
        (customers, output)
    }

    #[test]
    fn test_latest_record_per_customer_survives() {
        let (customers, output) = conform(vec![
            json!({"cst_id": 29466, "cst_key": "AW00029466", "cst_firstname": "Lance", "cst_create_date": "2026-01-25", "cst_gndr": null}),
            json!({"cst_id": 29466, "cst_key": "AW00029466", "cst_firstname": "Lance", "cst_create_date": "2026-01-27", "cst_gndr": "M"}),
        ]);
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].gender, "Male");
        assert_eq!(customers[0].created_on, NaiveDate::from_ymd_opt(2026, 1, 27));
        assert_eq!(output.duplicates_dropped, 1);
    }

    #[test]
    fn test_cleansing_trims_and_maps_codes() {
        let (customers, _) = conform(vec![json!({
            "cst_id": "11000",
            "cst_key": " AW00011000 ",
            "cst_firstname": "  Jon",
            "cst_lastname": "Yang  ",
            "cst_marital_status": "m",
            "cst_gndr": " F ",
            "cst_create_date": "2025-10-06"
        })]);
        let c = &customers[0];
        assert_eq!(c.customer_id, 11000);
        assert_eq!(c.customer_number, "AW00011000");
        assert_eq!(c.first_name, "Jon");
        assert_eq!(c.last_name, "Yang");
        assert_eq!(c.marital_status, "Married");
        assert_eq!(c.gender, "Female");
    }

    #[test]
    fn test_rows_without_key_are_dropped_and_counted() {
        let (customers, output) = conform(vec![
            json!({"cst_id": null, "cst_key": "SF566"}),
            json!({"cst_id": "abc", "cst_key": "PO25"}),
            json!({"cst_id": 5, "cst_key": "AW5", "cst_marital_status": "Z"}),
        ]);
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].marital_status, "n/a");
        assert_eq!(customers[0].gender, "n/a");
        assert_eq!(output.rows_in, 3);
        assert_eq!(output.defects.count_kind(DefectKind::MissingKey), 2);
        assert_eq!(output.defects.count("cst_marital_status", DefectKind::UnmappedCode), 1);
    }
}

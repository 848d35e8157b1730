use chrono::NaiveDate;

use super::super::measures::Measures;
use super::super::rules;
use super::super::{latest_per_key, Candidate, ConformContext, ConformOutput, Conformer, DefectKind, Defects};
use crate::common::constants::CRM_SALES;
use crate::common::error::Result;
use crate::domain::{CrmSale, RawRecord};

/// CRM order lines. Keyed by (`sls_ord_num`, `sls_prd_key`); the extract has
/// no recency column so the first-seen line wins. Dates arrive as `yyyymmdd`
/// codes and measures are repaired.
pub struct CrmSaleConformer;

impl Conformer for CrmSaleConformer {
    fn relation(&self) -> &'static str {
        CRM_SALES
    }

    fn conform(&self, records: Vec<RawRecord>, _ctx: &ConformContext) -> Result<ConformOutput> {
        let rows_in = records.len();
        let mut defects = Defects::default();
        let mut candidates: Vec<Candidate<(String, String), NaiveDate, CrmSale>> =
            Vec::with_capacity(rows_in);

        for raw in &records {
            let order_number = rules::text(raw.get("sls_ord_num"));
            let product_number = rules::text(raw.get("sls_prd_key"));
            let (Some(order_number), Some(product_number)) = (order_number, product_number) else {
                defects.note("sls_ord_num", DefectKind::MissingKey);
                continue;
            };

            let source = Measures {
                amount: defects.track("sls_sales", rules::decimal(raw.get("sls_sales"))),
                quantity: defects.track("sls_quantity", rules::integer(raw.get("sls_quantity"))),
                price: defects.track("sls_price", rules::decimal(raw.get("sls_price"))),
            };
            let repaired = source.repair();
            if repaired.overflowed {
                defects.note("sls_sales", DefectKind::MalformedValue);
            } else if repaired.amount_repaired {
                defects.note("sls_sales", DefectKind::RepairedAmount);
            }
            if repaired.price_derived {
                defects.note("sls_price", DefectKind::DerivedPrice);
            }

            let sale = CrmSale {
                order_number: order_number.clone(),
                product_number: product_number.clone(),
                customer_id: defects.track("sls_cust_id", rules::integer(raw.get("sls_cust_id"))),
                order_date: defects.track("sls_order_dt", rules::date(raw.get("sls_order_dt"))),
                ship_date: defects.track("sls_ship_dt", rules::date(raw.get("sls_ship_dt"))),
                due_date: defects.track("sls_due_dt", rules::date(raw.get("sls_due_dt"))),
                amount: repaired.measures.amount,
                quantity: repaired.measures.quantity,
                price: repaired.measures.price,
            };
            candidates.push(Candidate {
                key: (order_number, product_number),
                recency: None,
                row_number: raw.row_number,
                record: sale,
            });
        }

        ConformOutput::from_records(CRM_SALES, rows_in, latest_per_key(candidates), defects)
    }
}

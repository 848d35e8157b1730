use std::collections::HashMap;

use super::keys::CustomerKeyNormalizer;
use crate::common::constants::NOT_AVAILABLE;
use crate::domain::{CrmCustomer, CustomerDim, ErpCustomer, ErpLocation};

/// Primary-source value unless it is the sentinel, then the secondary value,
/// then the sentinel.
pub fn survive(primary: &str, secondary: Option<&str>) -> String {
    if primary != NOT_AVAILABLE {
        return primary.to_string();
    }
    secondary
        .filter(|s| *s != NOT_AVAILABLE)
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Index records by normalized key; on collision the first in key order wins
fn index_by<'a, T>(
    records: &'a [T],
    keys: &CustomerKeyNormalizer,
    key_of: impl Fn(&T) -> &str,
) -> HashMap<String, &'a T> {
    let mut sorted: Vec<&T> = records.iter().collect();
    sorted.sort_by(|a, b| key_of(a).cmp(key_of(b)));
    let mut index = HashMap::with_capacity(sorted.len());
    for record in sorted {
        index.entry(keys.normalize(key_of(record))).or_insert(record);
    }
    index
}

/// CRM customers enriched with ERP demographics and location. Every CRM
/// customer yields exactly one row; `customer_key` follows `customer_id` order.
pub fn build_customer_dimension(
    crm: &[CrmCustomer],
    erp: &[ErpCustomer],
    locations: &[ErpLocation],
    keys: &CustomerKeyNormalizer,
) -> Vec<CustomerDim> {
    let demographics = index_by(erp, keys, |c| c.customer_number.as_str());
    let places = index_by(locations, keys, |l| l.customer_number.as_str());

    let mut customers: Vec<&CrmCustomer> = crm.iter().collect();
    customers.sort_by_key(|c| c.customer_id);

    customers
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let match_key = keys.normalize(&c.customer_number);
            let erp_match = demographics.get(&match_key);
            CustomerDim {
                customer_key: i as u64 + 1,
                customer_id: c.customer_id,
                customer_number: c.customer_number.clone(),
                first_name: c.first_name.clone(),
                last_name: c.last_name.clone(),
                country: places
                    .get(&match_key)
                    .map(|l| l.country.clone())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                marital_status: c.marital_status.clone(),
                gender: survive(&c.gender, erp_match.map(|e| e.gender.as_str())),
                birth_date: erp_match.and_then(|e| e.birth_date),
                created_on: c.created_on,
            }
        })
        .collect()
}

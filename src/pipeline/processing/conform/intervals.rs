use chrono::NaiveDate;

use crate::domain::CrmProduct;

/// A record that is one version in a chronological series sharing a natural key
pub trait Versioned {
    fn natural_key(&self) -> &str;
    fn valid_from(&self) -> Option<NaiveDate>;
    /// Orders versions that start on the same date
    fn sequence(&self) -> i64;
    fn set_valid_to(&mut self, valid_to: Option<NaiveDate>);
}

impl Versioned for CrmProduct {
    fn natural_key(&self) -> &str {
        &self.product_number
    }

    fn valid_from(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn sequence(&self) -> i64 {
        self.product_id
    }

    fn set_valid_to(&mut self, valid_to: Option<NaiveDate>) {
        self.end_date = valid_to;
    }
}

/// Each version ends one day before the next version of the same natural key
/// starts; the last version stays open-ended. Versions with an unknown start
/// are ordered after every dated version. Record order is left unchanged.
pub fn derive_validity_ends<T: Versioned>(records: &mut [T]) {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&records[a], &records[b]);
        ra.natural_key()
            .cmp(rb.natural_key())
            .then_with(|| {
                (ra.valid_from().is_none(), ra.valid_from())
                    .cmp(&(rb.valid_from().is_none(), rb.valid_from()))
            })
            .then_with(|| ra.sequence().cmp(&rb.sequence()))
    });

    for (pos, &index) in order.iter().enumerate() {
        let next_start = order
            .get(pos + 1)
            .map(|&next| &records[next])
            .filter(|next| next.natural_key() == records[index].natural_key())
            .and_then(|next| next.valid_from());
        let valid_to = next_start.and_then(|start| start.pred_opt());
        records[index].set_valid_to(valid_to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn product(id: i64, number: &str, start: Option<(i32, u32, u32)>) -> CrmProduct {
        CrmProduct {
            product_id: id,
            category_id: "CO_RF".to_string(),
            product_number: number.to_string(),
            product_name: format!("Product {}", id),
            cost: Decimal::ZERO,
            product_line: "Road".to_string(),
            start_date: start.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            end_date: None,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn test_three_versions_chain() {
        // Deliberately out of chronological order
        let mut products = vec![
            product(3, "FR-R92B-58", Some((2013, 7, 1))),
            product(1, "FR-R92B-58", Some((2011, 7, 1))),
            product(2, "FR-R92B-58", Some((2012, 7, 1))),
        ];
        derive_validity_ends(&mut products);

        assert_eq!(products[1].end_date, d(2012, 6, 30));
        assert_eq!(products[2].end_date, d(2013, 6, 30));
        assert_eq!(products[0].end_date, None);
        assert_eq!(products[0].product_id, 3);
    }

    #[test]
    fn test_keys_do_not_leak_into_each_other() {
        let mut products = vec![
            product(1, "AAA", Some((2020, 1, 1))),
            product(2, "BBB", Some((2021, 1, 1))),
        ];
        derive_validity_ends(&mut products);
        assert!(products.iter().all(|p| p.end_date.is_none()));
    }

    #[test]
    fn test_unknown_start_sorts_last_and_stays_open() {
        let mut products = vec![
            product(1, "AAA", None),
            product(2, "AAA", Some((2020, 3, 1))),
        ];
        derive_validity_ends(&mut products);
        assert_eq!(products[1].end_date, None);
        assert_eq!(products[0].end_date, None);
    }

    #[test]
    fn test_month_and_year_boundaries() {
        let mut products = vec![
            product(1, "AAA", Some((2019, 6, 15))),
            product(2, "AAA", Some((2020, 1, 1))),
            product(3, "AAA", Some((2020, 3, 1))),
        ];
        derive_validity_ends(&mut products);
        assert_eq!(products[0].end_date, d(2019, 12, 31));
        assert_eq!(products[1].end_date, d(2020, 2, 29));
    }
}

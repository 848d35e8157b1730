//! Pure checks over published and conformed relations. Each returns the
//! findings it produced; none of them touch a store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

use super::findings::Finding;
use crate::domain::{CustomerDim, ProductDim, SalesFact};
use crate::pipeline::processing::conform::rules::CodeMap;

/// Every fact whose keys fail to resolve, with both flags reported
pub fn orphan_facts(
    facts: &[SalesFact],
    customers: &[CustomerDim],
    products: &[ProductDim],
) -> Vec<Finding> {
    let customer_keys: HashSet<u64> = customers.iter().map(|c| c.customer_key).collect();
    let product_keys: HashSet<u64> = products.iter().map(|p| p.product_key).collect();

    facts
        .iter()
        .filter_map(|fact| {
            let customer_missing = !fact
                .customer_key
                .is_some_and(|k| customer_keys.contains(&k));
            let product_missing = !fact
                .product_key
                .is_some_and(|k| product_keys.contains(&k));
            (customer_missing || product_missing).then(|| Finding::OrphanFact {
                order_number: fact.order_number.clone(),
                product_number: fact.product_number.clone(),
                customer_missing,
                product_missing,
            })
        })
        .collect()
}

pub fn count_parity(
    relation: &str,
    source_relation: &str,
    expected: usize,
    actual: usize,
) -> Option<Finding> {
    (expected != actual).then(|| Finding::CountMismatch {
        relation: relation.to_string(),
        source_relation: source_relation.to_string(),
        expected,
        actual,
        difference: expected as i64 - actual as i64,
    })
}

pub fn distinct_values<'a>(
    relation: &str,
    attribute: &str,
    values: impl IntoIterator<Item = &'a str>,
) -> Finding {
    Finding::DistinctValues {
        relation: relation.to_string(),
        attribute: attribute.to_string(),
        values: values.into_iter().map(str::to_string).collect(),
    }
}

/// One finding per distinct value the code table could never have produced
pub fn unexpected_categories<'a>(
    relation: &str,
    attribute: &str,
    values: impl IntoIterator<Item = &'a str>,
    table: &CodeMap,
) -> Vec<Finding> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.into_iter().filter(|v| !table.is_label(v)) {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(value, occurrences)| Finding::UnexpectedCategory {
            relation: relation.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            occurrences,
        })
        .collect()
}

pub fn duplicate_keys(relation: &str, keys: impl IntoIterator<Item = u64>) -> Vec<Finding> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, occurrences)| *occurrences > 1)
        .map(|(key, occurrences)| Finding::DuplicateKey {
            relation: relation.to_string(),
            key,
            occurrences,
        })
        .collect()
}

/// Order date must not be later than the ship date or the due date.
/// Unknown dates are not compared.
pub fn date_order(facts: &[SalesFact]) -> Vec<Finding> {
    facts
        .iter()
        .filter_map(|fact| {
            let order_date = fact.order_date?;
            let late = |other: Option<NaiveDate>| other.is_some_and(|d| order_date > d);
            (late(fact.ship_date) || late(fact.due_date)).then(|| Finding::DateOrderViolation {
                order_number: fact.order_number.clone(),
                product_number: fact.product_number.clone(),
                order_date,
                ship_date: fact.ship_date,
                due_date: fact.due_date,
            })
        })
        .collect()
}

pub fn measure_consistency(facts: &[SalesFact]) -> Vec<Finding> {
    facts
        .iter()
        .filter_map(|fact| {
            let (amount, quantity, price) = (fact.amount?, fact.quantity?, fact.price?);
            let expected = Decimal::from(quantity).checked_mul(price);
            (expected != Some(amount)).then(|| Finding::MeasureInconsistency {
                order_number: fact.order_number.clone(),
                product_number: fact.product_number.clone(),
                amount,
                quantity,
                price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::conform::rules::CRM_GENDER;

    fn fact(order: &str, customer_key: Option<u64>, product_key: Option<u64>) -> SalesFact {
        SalesFact {
            order_number: order.to_string(),
            product_number: "BK-R93R-62".to_string(),
            customer_id: Some(11000),
            product_key,
            customer_key,
            order_date: NaiveDate::from_ymd_opt(2010, 12, 29),
            ship_date: NaiveDate::from_ymd_opt(2011, 1, 5),
            due_date: NaiveDate::from_ymd_opt(2011, 1, 10),
            amount: Some(Decimal::from(30)),
            quantity: Some(3),
            price: Some(Decimal::from(10)),
        }
    }

    fn customer(key: u64) -> CustomerDim {
        CustomerDim {
            customer_key: key,
            customer_id: 11000 + key as i64,
            customer_number: format!("AW{:08}", 11000 + key),
            first_name: "Jon".to_string(),
            last_name: "Yang".to_string(),
            country: "Australia".to_string(),
            marital_status: "Married".to_string(),
            gender: "Male".to_string(),
            birth_date: None,
            created_on: None,
        }
    }

    fn product(key: u64) -> ProductDim {
        ProductDim {
            product_key: key,
            product_id: key as i64,
            product_number: "BK-R93R-62".to_string(),
            product_name: "Road-150 Red- 62".to_string(),
            category_id: "BI_RB".to_string(),
            category: "Bikes".to_string(),
            subcategory: "Road Bikes".to_string(),
            maintenance: "No".to_string(),
            cost: Decimal::from(2171),
            product_line: "Road".to_string(),
            start_date: None,
        }
    }

    #[test]
    fn test_orphan_facts_flags_each_missing_side() {
        let facts = vec![
            fact("SO1", Some(1), Some(1)),
            fact("SO2", None, Some(1)),
            fact("SO3", Some(1), Some(9)),
        ];
        let findings = orphan_facts(&facts, &[customer(1)], &[product(1)]);

        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0],
            Finding::OrphanFact {
                order_number: "SO2".to_string(),
                product_number: "BK-R93R-62".to_string(),
                customer_missing: true,
                product_missing: false,
            }
        );
        assert!(matches!(
            findings[1],
            Finding::OrphanFact {
                customer_missing: false,
                product_missing: true,
                ..
            }
        ));
    }

    #[test]
    fn test_count_parity_reports_difference() {
        let finding = count_parity("fact_sales", "crm_sales", 1000, 998).unwrap();
        match finding {
            Finding::CountMismatch {
                expected,
                actual,
                difference,
                ..
            } => {
                assert_eq!(expected, 1000);
                assert_eq!(actual, 998);
                assert_eq!(difference, 2);
            }
            other => panic!("unexpected finding {:?}", other),
        }
        assert!(count_parity("fact_sales", "crm_sales", 10, 10).is_none());
    }

    #[test]
    fn test_unexpected_categories_groups_by_value() {
        let values = ["Male", "Female", "n/a", "Unknown", "Unknown", "X"];
        let findings = unexpected_categories("dim_customers", "gender", values, &CRM_GENDER);

        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0],
            Finding::UnexpectedCategory {
                relation: "dim_customers".to_string(),
                attribute: "gender".to_string(),
                value: "Unknown".to_string(),
                occurrences: 2,
            }
        );
    }

    #[test]
    fn test_duplicate_keys() {
        let findings = duplicate_keys("dim_products", [1, 2, 2, 3, 3, 3]);
        assert_eq!(findings.len(), 2);
        assert!(matches!(findings[1], Finding::DuplicateKey { key: 3, occurrences: 3, .. }));
        assert!(duplicate_keys("dim_products", [1, 2, 3]).is_empty());
    }

    #[test]
    fn test_date_order_ignores_unknown_dates() {
        let mut late = fact("SO1", Some(1), Some(1));
        late.order_date = NaiveDate::from_ymd_opt(2011, 2, 1);
        let mut unknown_ship = fact("SO2", Some(1), Some(1));
        unknown_ship.ship_date = None;
        unknown_ship.due_date = None;

        let findings = date_order(&[late, unknown_ship, fact("SO3", Some(1), Some(1))]);
        assert_eq!(findings.len(), 1);
        assert!(matches!(&findings[0], Finding::DateOrderViolation { order_number, .. } if order_number == "SO1"));
    }

    #[test]
    fn test_measure_consistency_skips_unknown_measures() {
        let mut wrong = fact("SO1", Some(1), Some(1));
        wrong.amount = Some(Decimal::from(31));
        let mut unknown = fact("SO2", Some(1), Some(1));
        unknown.price = None;

        let findings = measure_consistency(&[wrong, unknown, fact("SO3", Some(1), Some(1))]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_measure_consistency_flags_unrepresentable_product() {
        let mut huge = fact("SO5", Some(1), Some(1));
        huge.amount = Some(Decimal::from(5));
        huge.quantity = Some(9_000_000_000_000_000_000);
        huge.price = Some(Decimal::from(100_000_000_000i64));

        let findings = measure_consistency(&[huge]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind(), "measure_inconsistency");
    }

    #[test]
    fn test_distinct_values_sorted() {
        let finding = distinct_values("dim_customers", "country", ["Germany", "Australia", "Germany"]);
        match finding {
            Finding::DistinctValues { values, .. } => {
                assert_eq!(values.into_iter().collect::<Vec<_>>(), vec!["Australia", "Germany"]);
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }
}

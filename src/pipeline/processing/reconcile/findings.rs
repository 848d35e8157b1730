use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How much attention a finding needs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational profile output
    Info,
    /// Suspicious data that still published
    Warning,
    /// Broken integrity between relations
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation made by the reconciliation engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A fact row whose customer or product key does not resolve to a dimension row
    OrphanFact {
        order_number: String,
        product_number: String,
        customer_missing: bool,
        product_missing: bool,
    },
    /// Published row count differs from the conformed source count
    CountMismatch {
        relation: String,
        source_relation: String,
        expected: usize,
        actual: usize,
        /// `expected - actual`
        difference: i64,
    },
    DistinctValues {
        relation: String,
        attribute: String,
        values: BTreeSet<String>,
    },
    /// A categorical value outside the label set its code table can produce
    UnexpectedCategory {
        relation: String,
        attribute: String,
        value: String,
        occurrences: usize,
    },
    DuplicateKey {
        relation: String,
        key: u64,
        occurrences: usize,
    },
    /// Order date later than the ship or due date
    DateOrderViolation {
        order_number: String,
        product_number: String,
        order_date: NaiveDate,
        ship_date: Option<NaiveDate>,
        due_date: Option<NaiveDate>,
    },
    MeasureInconsistency {
        order_number: String,
        product_number: String,
        amount: Decimal,
        quantity: i64,
        price: Decimal,
    },
}

impl Finding {
    pub fn kind(&self) -> &'static str {
        match self {
            Finding::OrphanFact { .. } => "orphan_fact",
            Finding::CountMismatch { .. } => "count_mismatch",
            Finding::DistinctValues { .. } => "distinct_values",
            Finding::UnexpectedCategory { .. } => "unexpected_category",
            Finding::DuplicateKey { .. } => "duplicate_key",
            Finding::DateOrderViolation { .. } => "date_order_violation",
            Finding::MeasureInconsistency { .. } => "measure_inconsistency",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Finding::DistinctValues { .. } => Severity::Info,
            Finding::UnexpectedCategory { .. }
            | Finding::DateOrderViolation { .. }
            | Finding::MeasureInconsistency { .. } => Severity::Warning,
            Finding::OrphanFact { .. }
            | Finding::CountMismatch { .. }
            | Finding::DuplicateKey { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::OrphanFact {
                order_number,
                product_number,
                customer_missing,
                product_missing,
            } => write!(
                f,
                "orphan fact {}/{} (customer missing: {}, product missing: {})",
                order_number, product_number, customer_missing, product_missing
            ),
            Finding::CountMismatch {
                relation,
                source_relation,
                expected,
                actual,
                difference,
            } => write!(
                f,
                "{} has {} rows but {} has {} (difference {})",
                relation, actual, source_relation, expected, difference
            ),
            Finding::DistinctValues {
                relation,
                attribute,
                values,
            } => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "{}.{}: [{}]", relation, attribute, values.join(", "))
            }
            Finding::UnexpectedCategory {
                relation,
                attribute,
                value,
                occurrences,
            } => write!(
                f,
                "{}.{} holds unexpected value '{}' in {} rows",
                relation, attribute, value, occurrences
            ),
            Finding::DuplicateKey {
                relation,
                key,
                occurrences,
            } => write!(f, "{} key {} appears {} times", relation, key, occurrences),
            Finding::DateOrderViolation {
                order_number,
                product_number,
                order_date,
                ..
            } => write!(
                f,
                "order {}/{} dated {} after its ship or due date",
                order_number, product_number, order_date
            ),
            Finding::MeasureInconsistency {
                order_number,
                product_number,
                amount,
                quantity,
                price,
            } => write!(
                f,
                "order {}/{} amount {} != {} x {}",
                order_number, product_number, amount, quantity, price
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_finding_serializes_with_kind_tag() {
        let finding = Finding::DuplicateKey {
            relation: "dim_products".to_string(),
            key: 4,
            occurrences: 2,
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "duplicate_key");
        assert_eq!(json["key"], 4);
        assert_eq!(finding.kind(), "duplicate_key");
        assert_eq!(finding.severity(), Severity::Error);
    }

    #[test]
    fn test_count_mismatch_display() {
        let finding = Finding::CountMismatch {
            relation: "fact_sales".to_string(),
            source_relation: "crm_sales".to_string(),
            expected: 1000,
            actual: 998,
            difference: 2,
        };
        assert_eq!(
            finding.to_string(),
            "fact_sales has 998 rows but crm_sales has 1000 (difference 2)"
        );
    }
}

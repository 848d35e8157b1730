use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A source-shaped row as landed by the bulk loader. No uniqueness and no
/// cleansing guarantees; values are coarse JSON scalars and may be malformed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    /// Position of the row in its extract, assigned at load time
    pub row_number: u64,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(row_number: u64, fields: Map<String, Value>) -> Self {
        Self { row_number, fields }
    }

    /// Build a record from a JSON object; any other JSON shape yields an empty row.
    pub fn from_value(row_number: u64, value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { row_number, fields },
            _ => Self {
                row_number,
                fields: Map::new(),
            },
        }
    }

    /// Column lookup that treats an explicit JSON null the same as a missing column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column).filter(|v| !v.is_null())
    }
}

// ---------------------------------------------------------------------------
// Conformed records: one per business key per source relation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmCustomer {
    pub customer_id: i64,
    pub customer_number: String,
    pub first_name: String,
    pub last_name: String,
    pub marital_status: String,
    pub gender: String,
    pub created_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmProduct {
    pub product_id: i64,
    /// Join key into the ERP category relation
    pub category_id: String,
    /// Natural key shared by every version of the product
    pub product_number: String,
    pub product_name: String,
    pub cost: Decimal,
    pub product_line: String,
    pub start_date: Option<NaiveDate>,
    /// Derived from the next version's start date; `None` while open-ended
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmSale {
    pub order_number: String,
    pub product_number: String,
    pub customer_id: Option<i64>,
    pub order_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpCustomer {
    pub customer_number: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpLocation {
    pub customer_number: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpCategory {
    pub category_id: String,
    pub category: String,
    pub subcategory: String,
    pub maintenance: String,
}

// ---------------------------------------------------------------------------
// Published dimensional model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerDim {
    pub customer_key: u64,
    pub customer_id: i64,
    pub customer_number: String,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub marital_status: String,
    pub gender: String,
    pub birth_date: Option<NaiveDate>,
    pub created_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductDim {
    pub product_key: u64,
    pub product_id: i64,
    pub product_number: String,
    pub product_name: String,
    pub category_id: String,
    pub category: String,
    pub subcategory: String,
    pub maintenance: String,
    pub cost: Decimal,
    pub product_line: String,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesFact {
    pub order_number: String,
    /// Natural keys kept alongside the resolved keys so orphans stay traceable
    pub product_number: String,
    pub customer_id: Option<i64>,
    pub product_key: Option<u64>,
    pub customer_key: Option<u64>,
    pub order_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
}

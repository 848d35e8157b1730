use std::collections::HashMap;

use crate::domain::{CrmSale, CustomerDim, ProductDim, SalesFact};

/// Fact rows plus counts of keys that did not resolve
#[derive(Debug, Clone)]
pub struct FactBuild {
    pub facts: Vec<SalesFact>,
    pub unresolved_customers: usize,
    pub unresolved_products: usize,
}

/// product number → key of its most recently started current version
fn product_lookup(products: &[ProductDim]) -> HashMap<&str, &ProductDim> {
    let rank = |p: &ProductDim| (p.start_date.is_some(), p.start_date, p.product_key);
    let mut lookup: HashMap<&str, &ProductDim> = HashMap::with_capacity(products.len());
    for product in products {
        lookup
            .entry(product.product_number.as_str())
            .and_modify(|existing| {
                if rank(product) > rank(*existing) {
                    *existing = product;
                }
            })
            .or_insert(product);
    }
    lookup
}

/// Project every conformed sale onto the dimensions' stable keys. Sales whose
/// keys do not resolve are kept with `None` keys for reconciliation to flag.
pub fn build_sales_fact(
    sales: &[CrmSale],
    customers: &[CustomerDim],
    products: &[ProductDim],
) -> FactBuild {
    let customer_keys: HashMap<i64, u64> = customers
        .iter()
        .map(|c| (c.customer_id, c.customer_key))
        .collect();
    let product_keys = product_lookup(products);

    let mut unresolved_customers = 0;
    let mut unresolved_products = 0;
    let facts = sales
        .iter()
        .map(|s| {
            let customer_key = s.customer_id.and_then(|id| customer_keys.get(&id).copied());
            let product_key = product_keys
                .get(s.product_number.as_str())
                .map(|p| p.product_key);
            unresolved_customers += usize::from(customer_key.is_none());
            unresolved_products += usize::from(product_key.is_none());
            SalesFact {
                order_number: s.order_number.clone(),
                product_number: s.product_number.clone(),
                customer_id: s.customer_id,
                product_key,
                customer_key,
                order_date: s.order_date,
                ship_date: s.ship_date,
                due_date: s.due_date,
                amount: s.amount,
                quantity: s.quantity,
                price: s.price,
            }
        })
        .collect();

    FactBuild {
        facts,
        unresolved_customers,
        unresolved_products,
    }
}

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::common::constants::NOT_AVAILABLE;
use crate::domain::{CrmProduct, ErpCategory, ProductDim};

/// A version is current unless its derived end date lies before the run date
pub fn is_current(product: &CrmProduct, run_date: NaiveDate) -> bool {
    !product.end_date.map_or(false, |end| end < run_date)
}

/// Current product versions joined to their ERP category. `product_key`
/// follows (start date, product number, product id), unknown starts last.
pub fn build_product_dimension(
    products: &[CrmProduct],
    categories: &[ErpCategory],
    run_date: NaiveDate,
) -> Vec<ProductDim> {
    let categories: HashMap<&str, &ErpCategory> = categories
        .iter()
        .map(|c| (c.category_id.as_str(), c))
        .collect();

    let mut current: Vec<&CrmProduct> = products.iter().filter(|p| is_current(p, run_date)).collect();
    current.sort_by(|a, b| {
        (a.start_date.is_none(), a.start_date, &a.product_number, a.product_id)
            .cmp(&(b.start_date.is_none(), b.start_date, &b.product_number, b.product_id))
    });

    current
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let (category, subcategory, maintenance) = match categories.get(p.category_id.as_str()) {
                Some(c) => (c.category.clone(), c.subcategory.clone(), c.maintenance.clone()),
                None => (
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                ),
            };
            ProductDim {
                product_key: i as u64 + 1,
                product_id: p.product_id,
                product_number: p.product_number.clone(),
                product_name: p.product_name.clone(),
                category_id: p.category_id.clone(),
                category,
                subcategory,
                maintenance,
                cost: p.cost,
                product_line: p.product_line.clone(),
                start_date: p.start_date,
            }
        })
        .collect()
}

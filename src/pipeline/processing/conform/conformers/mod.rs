//! One conformer per source relation

mod crm_customers;
mod crm_products;
mod crm_sales;
mod erp_categories;
mod erp_customers;
mod erp_locations;

pub use crm_customers::CrmCustomerConformer;
pub use crm_products::{split_product_key, CrmProductConformer};
pub use crm_sales::CrmSaleConformer;
pub use erp_categories::ErpCategoryConformer;
pub use erp_customers::ErpCustomerConformer;
pub use erp_locations::ErpLocationConformer;

/// Relation name constants shared by the stores and the engines.
/// Raw staging and the conformed store use the same names per source entity.

// CRM (primary source)
pub const CRM_CUSTOMERS: &str = "crm_customers";
pub const CRM_PRODUCTS: &str = "crm_products";
pub const CRM_SALES: &str = "crm_sales";

// ERP (secondary source)
pub const ERP_CUSTOMERS: &str = "erp_customers";
pub const ERP_LOCATIONS: &str = "erp_locations";
pub const ERP_CATEGORIES: &str = "erp_categories";

// Published dimensional model
pub const DIM_CUSTOMERS: &str = "dim_customers";
pub const DIM_PRODUCTS: &str = "dim_products";
pub const FACT_SALES: &str = "fact_sales";

/// Label used whenever a categorical value cannot be mapped or joined.
pub const NOT_AVAILABLE: &str = "n/a";

/// Get all source relations in the order the conformance engine reports them
pub fn source_relations() -> Vec<&'static str> {
    vec![
        CRM_CUSTOMERS,
        CRM_PRODUCTS,
        CRM_SALES,
        ERP_CUSTOMERS,
        ERP_LOCATIONS,
        ERP_CATEGORIES,
    ]
}

/// Get all published relations in the order the modeling engine writes them
pub fn published_relations() -> Vec<&'static str> {
    vec![DIM_CUSTOMERS, DIM_PRODUCTS, FACT_SALES]
}

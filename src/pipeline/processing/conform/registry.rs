use std::collections::HashMap;
use std::sync::Arc;

use super::conformers::{
    CrmCustomerConformer, CrmProductConformer, CrmSaleConformer, ErpCategoryConformer,
    ErpCustomerConformer, ErpLocationConformer,
};
use super::Conformer;
use crate::common::constants::source_relations;
use crate::common::error::{PipelineError, Result};

/// Registry of relation-specific conformers
pub struct ConformerRegistry {
    conformers: HashMap<String, Arc<dyn Conformer>>,
}

impl Default for ConformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConformerRegistry {
    /// Create a registry with the built-in CRM and ERP conformers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CrmCustomerConformer));
        registry.register(Arc::new(CrmProductConformer));
        registry.register(Arc::new(CrmSaleConformer));
        registry.register(Arc::new(ErpCustomerConformer));
        registry.register(Arc::new(ErpLocationConformer));
        registry.register(Arc::new(ErpCategoryConformer));
        registry
    }

    pub fn empty() -> Self {
        Self {
            conformers: HashMap::new(),
        }
    }

    /// Register a conformer, replacing any previous one for the same relation
    pub fn register(&mut self, conformer: Arc<dyn Conformer>) {
        self.conformers
            .insert(conformer.relation().to_string(), conformer);
    }

    pub fn get(&self, relation: &str) -> Result<Arc<dyn Conformer>> {
        self.conformers
            .get(relation)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownRelation(relation.to_string()))
    }

    pub fn len(&self) -> usize {
        self.conformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformers.is_empty()
    }

    /// Reporting position: built-in relations first in their canonical order,
    /// then anything else alphabetically
    pub fn position(&self, relation: &str) -> (usize, String) {
        let index = source_relations()
            .iter()
            .position(|r| *r == relation)
            .unwrap_or(usize::MAX);
        (index, relation.to_string())
    }

    /// List all registered relations in reporting order
    pub fn list_relations(&self) -> Vec<&str> {
        let mut relations: Vec<&str> = self.conformers.keys().map(|k| k.as_str()).collect();
        relations.sort_by_key(|r| self.position(r));
        relations
    }

    pub fn conformers(&self) -> Vec<Arc<dyn Conformer>> {
        self.list_relations()
            .into_iter()
            .filter_map(|r| self.conformers.get(r).cloned())
            .collect()
    }
}

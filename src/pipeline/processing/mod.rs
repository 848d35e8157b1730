// Pipeline processing: the three engines, run in this order

pub mod conform;
pub mod model;
pub mod reconcile;

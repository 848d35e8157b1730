// Observability: structured logging and stage metrics

pub mod logging;
pub mod metrics;

pub use logging::init_logging;

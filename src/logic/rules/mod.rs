pub mod alert;
pub mod condition;
pub mod engine;
pub mod execution_log;
pub mod loader;
pub mod matcher;
pub mod sla;

pub use engine::DecisionEngine;

pub mod rules;

pub use rules::DecisionEngine;

pub mod evaluation;
pub mod history;
pub mod metrics;
pub mod ruleset;

pub use evaluation::*;
pub use history::*;
pub use metrics::*;
pub use ruleset::*;

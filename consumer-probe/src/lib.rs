pub mod config;
pub mod evaluator;
pub mod metrics;
pub mod prom;
pub mod router;
pub mod server;

pub use config::Config;
pub use evaluator::{EvaluationResult, Evaluator};
pub use prom::{PromClient, SignalResult, SignalSource};

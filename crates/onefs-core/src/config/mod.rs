//! Configuration loading and the validation accumulator.

pub mod traits;
pub mod validation;

pub use traits::{parse_bool, ConfigError, EngineConfig};
pub use validation::{ConfigValidator, ValidationError, ValidationResult};

pub mod analyzer;
pub mod ast_utils;
pub mod backup;
pub mod bindings;
pub mod builder;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod literal;
pub mod patch;
pub mod report;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::ConverterConfig;
pub use errors::ServiceError;
pub use report::ConversionReport;
pub use service::{ConversionService, FileConversion};
pub use types::*;

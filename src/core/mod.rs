/*!
 * Core Module
 * Fundamental kernel types, tables, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod table;
pub mod types;

// Re-export for convenience
pub use config::KernelConfig;
pub use errors::*;
pub use table::ObjectTable;
pub use types::*;

//! Input/output helpers.
//!
//! - ledger ingest from JSON or CSV (`ingest`)
//! - report JSON and ledger CSV exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;

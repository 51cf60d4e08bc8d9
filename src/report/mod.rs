//! Reporting: executive summary, narrative grounding block, terminal tables.

pub mod format;

pub use format::{
    executive_summary, format_correlation_table, format_run_summary, render_narrative_context, unavailable_context,
};

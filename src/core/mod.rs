//! Core functionality for the search analytics connector.
//!
//! This module contains:
//! - The search-state model observed from the host
//! - Refinement encoding
//! - Duplicate suppression
//! - Report payloads

pub mod change;
pub mod report;
pub mod serializer;
pub mod state;

// Re-export commonly used types
pub use change::{comparison_key, ChangeDetector};
pub use report::{Report, ReportBuilder, ReportEnvelope, ReportProducer, PRODUCER_NAME};
pub use serializer::{encode_facets, encode_numeric, encode_refinements, encode_state};
pub use state::{
    AttributeMap, FacetRefinements, NumericFilter, NumericRefinements, RefinementValue,
    SearchSnapshot, StateSnapshot,
};

//! Structured-text conventions for BSON values.
//!
//! Documents are shown and edited as relaxed Extended JSON, so store-native
//! scalars such as object ids and dates survive a display/parse round trip.

pub mod order;
pub mod text;

pub use order::{compare_values, type_name, type_rank, values_equal};
pub use text::*;

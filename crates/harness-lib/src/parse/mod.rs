//! Parsers for the heterogeneous encodings found in telemetry fields

mod quantity;
mod timestamp;

pub use quantity::{parse_quantity, UNAVAILABLE};
pub use timestamp::parse_timestamp;

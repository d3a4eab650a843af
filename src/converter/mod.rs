//! Dataset converters.

mod csv;

pub use csv::{open_dataset, parse_address, CsvParser};

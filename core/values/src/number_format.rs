//! FILENAME: core/values/src/number_format.rs
//! PURPOSE: Number formatting for displaying aggregate values.
//! CONTEXT: Converts raw numeric aggregates to display strings with a fixed
//! number of decimal places.

/// Format a number with a fixed number of decimal places.
pub fn format_decimal(value: f64, decimal_places: u8) -> String {
    format!("{:.prec$}", value, prec = decimal_places as usize)
}

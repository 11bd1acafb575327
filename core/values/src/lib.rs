//! FILENAME: core/values/src/lib.rs
//! PURPOSE: Shared value types for the pivot engine.
//! CONTEXT: Re-exports the scalar value and the number formatting helper
//! used when turning raw aggregates into display strings.

pub mod number_format;
pub mod value;

pub use number_format::format_decimal;
pub use value::ScalarValue;

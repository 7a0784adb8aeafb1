//! SQL generation primitives for quarry.
//!
//! This crate owns the two pieces of SQL hygiene the query compilers rely
//! on:
//! - **Quoting & normalization**: identifier quoting and whitespace/comment
//!   normalization for generated SQL (`sanitize`).
//! - **Filter compilation**: structured include/exclude predicates to
//!   parameterized WHERE fragments (`filter`).
pub mod filter;
pub mod sanitize;

pub use filter::{compile_filter, FilterError};
pub use sanitize::{safe_name, sanitize_query};

//! Compiles structured include/exclude filters into SQL fragments.
//!
//! The output is a string of the form `AND (…) AND (…)` (empty when the
//! filter has no effective conditions) plus positional `?` arguments. The
//! caller supplies the surrounding `WHERE 1=1` base.

use quarry_common::models::{Cond, Filter};
use quarry_common::Value;
use thiserror::Error;

use crate::sanitize::safe_name;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter error: cannot bind {kind} value for dimension '{dimension}'")]
    UnsupportedValue {
        dimension: String,
        kind: &'static str,
    },
}

/// Compiles the whole filter. Include conditions are OR-combined within a
/// condition group, exclude conditions AND-combined, each group wrapped as
/// `AND (…)`.
pub fn compile_filter(filter: &Filter) -> Result<(String, Vec<Value>), FilterError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    for cond in &filter.include {
        if let Some((clause, cond_args)) = compile_cond(cond, false)? {
            clauses.push(clause);
            args.extend(cond_args);
        }
    }
    for cond in &filter.exclude {
        if let Some((clause, cond_args)) = compile_cond(cond, true)? {
            clauses.push(clause);
            args.extend(cond_args);
        }
    }

    Ok((clauses.join(" "), args))
}

/// Compiles one condition to `AND (…)`, or `None` when it has neither `in`
/// values nor `like` patterns.
fn compile_cond(cond: &Cond, exclude: bool) -> Result<Option<(String, Vec<Value>)>, FilterError> {
    let name = safe_name(&cond.name);
    let not = if exclude { "NOT " } else { "" };

    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    // Nulls in the `in` list are handled with an IS [NOT] NULL clause; the
    // engine's IN never matches them.
    let mut in_has_null = false;
    for value in &cond.in_ {
        match value {
            Value::Null => in_has_null = true,
            Value::Interval(_) => {
                return Err(FilterError::UnsupportedValue {
                    dimension: cond.name.clone(),
                    kind: value.kind(),
                })
            }
            other => args.push(other.clone()),
        }
    }
    if !args.is_empty() {
        let placeholders = vec!["?"; args.len()].join(",");
        clauses.push(format!("{name} {not}IN ({placeholders})"));
    }

    for pattern in &cond.like {
        args.push(Value::String(pattern.clone()));
        clauses.push(format!("{name} {not}ILIKE ?"));
    }

    if in_has_null {
        clauses.push(format!("{name} IS {not}NULL"));
    }

    if clauses.is_empty() {
        return Ok(None);
    }

    let joiner = if exclude { " AND " } else { " OR " };
    let mut joined = clauses.join(joiner);

    // `dim NOT IN (…)` excludes nulls even when null is not listed, so an
    // exclude condition must explicitly let them back in.
    if exclude && !in_has_null {
        joined.push_str(&format!(" OR {name} IS NULL"));
    }

    Ok(Some((format!("AND ({joined})"), args)))
}

use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn index_to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("index {value} exceeds SQLite INTEGER range"))
}

pub fn to_usize(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("{field} contains invalid value {value}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains invalid value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

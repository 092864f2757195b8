use crate::utils::error::{LookupError, Result};
use std::fmt::Display;
use std::ops::RangeInclusive;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl Display, reason: impl Into<String>) -> LookupError {
    LookupError::InvalidConfigValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Endpoints must be absolute http(s) URLs with a host.
pub fn validate_endpoint(field: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw.trim()).map_err(|e| invalid(field, raw, format!("not a URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            raw,
            format!("scheme '{}' is not http or https", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(invalid(field, raw, "URL has no host"));
    }
    Ok(())
}

/// Client credentials must be present and fully substituted.
pub fn validate_credential(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LookupError::config(field, "credential is missing"));
    }
    if value.contains("${") {
        return Err(LookupError::config(
            field,
            format!("unresolved environment variable in '{}'", value),
        ));
    }
    Ok(())
}

pub fn validate_bounds<T>(field: &str, value: T, bounds: RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + Display,
{
    if bounds.contains(&value) {
        Ok(())
    } else {
        let reason = format!("expected {} to {}", bounds.start(), bounds.end());
        Err(invalid(field, value, reason))
    }
}

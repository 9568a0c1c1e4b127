use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::error::AppError;

/// Parses `key=value` (or `Key: value`) header arguments into a header map.
///
/// Splits at whichever separator comes first; later occurrences of the same header
/// replace earlier ones.
pub fn parse_headers(params: &[String]) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();

    for param in params {
        let (key, value) = param
            .find(['=', ':'])
            .map(|at| (&param[..at], &param[at + 1..]))
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid header format: {param}")))?;

        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|e| AppError::InvalidInput(format!("Invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| AppError::InvalidInput(format!("Invalid value for header `{key}`: {e}")))?;

        debug!("Added header: {name}");
        headers.insert(name, value);
    }

    Ok(headers)
}

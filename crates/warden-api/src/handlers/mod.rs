//! Request handlers.

pub mod activation;
pub mod health;
pub mod network;
pub mod sessions;
pub mod statements;
pub mod status;

use crate::error::ApiError;

/// Pull a required, non-empty field out of a request body. Returns the
/// trimmed value or a 400 naming the field.
pub(crate) fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::missing_parameter(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert!(required(&None, "clientId").is_err());
        assert!(required(&Some("   ".to_string()), "clientId").is_err());
        let err = required(&Some(String::new()), "clientId").unwrap_err();
        assert_eq!(err.code, "missing_clientId");
    }

    #[test]
    fn test_required_trims() {
        let value = Some(" abc ".to_string());
        assert_eq!(required(&value, "uuid").unwrap(), "abc");
    }
}

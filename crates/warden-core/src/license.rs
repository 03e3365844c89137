//! The decoded license record and its validity rules.

use serde::{Deserialize, Serialize};

/// Sentinel meaning "no statement limit" in `number_of_statements`.
pub const UNLIMITED_STATEMENTS: i64 = -1;

/// The decoded content of the sealed license artifact.
///
/// Field names are part of the on-disk JSON contract and must not change:
/// artifacts sealed by earlier deployments decode into this exact shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// The license key issued by the upstream validator.
    #[serde(default)]
    pub license_key: String,
    /// The issuer's notion of "now" at issuance or last resync (epoch seconds).
    #[serde(default)]
    pub current_timestamp: i64,
    /// When the license expires (epoch seconds). Always > `current_timestamp`.
    #[serde(default)]
    pub expiry_timestamp: i64,
    /// Session pool capacity. Must be >= 1; unlimited is not supported here.
    #[serde(default)]
    pub number_of_users: i64,
    /// Statement allowance. -1 means unlimited.
    #[serde(default)]
    pub number_of_statements: i64,
    /// Free-form role string, opaque to the core.
    #[serde(default)]
    pub role: String,
    /// Statements consumed so far; mutated at runtime and flushed periodically.
    #[serde(default)]
    pub used_statements: i64,
    /// Monotonic-clock anchor (milliseconds) captured when this record was
    /// last resynced or loaded.
    #[serde(default)]
    pub system_up_time: u64,
}

impl LicenseRecord {
    /// Whether the record describes a usable license.
    pub fn is_valid(&self) -> bool {
        !self.license_key.is_empty()
            && self.current_timestamp > 0
            && self.expiry_timestamp > self.current_timestamp
            && self.number_of_users > 0
            && self.number_of_statements != 0
    }

    /// Whether the statement quota is unlimited.
    pub fn unlimited_statements(&self) -> bool {
        self.number_of_statements == UNLIMITED_STATEMENTS
    }

    /// License key with all but the last four characters masked, safe to log
    /// or return from status endpoints.
    pub fn masked_key(&self) -> String {
        let key = &self.license_key;
        if key.len() <= 4 {
            return "****".to_string();
        }
        format!("{}{}", "*".repeat(key.len() - 4), &key[key.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_record() -> LicenseRecord {
        LicenseRecord {
            license_key: "WARDEN-1234-5678".to_string(),
            current_timestamp: 1_700_000_000,
            expiry_timestamp: 1_800_000_000,
            number_of_users: 5,
            number_of_statements: 100,
            role: "standard".to_string(),
            used_statements: 0,
            system_up_time: 0,
        }
    }

    #[test]
    fn test_valid_record() {
        assert!(valid_record().is_valid());
    }

    #[test]
    fn test_empty_key_invalid() {
        let mut record = valid_record();
        record.license_key.clear();
        assert!(!record.is_valid());
    }

    #[test]
    fn test_expiry_must_exceed_current() {
        let mut record = valid_record();
        record.expiry_timestamp = record.current_timestamp;
        assert!(!record.is_valid());
    }

    #[test]
    fn test_zero_users_invalid() {
        let mut record = valid_record();
        record.number_of_users = 0;
        assert!(!record.is_valid());
    }

    #[test]
    fn test_zero_statements_invalid_but_unlimited_ok() {
        let mut record = valid_record();
        record.number_of_statements = 0;
        assert!(!record.is_valid());

        record.number_of_statements = UNLIMITED_STATEMENTS;
        assert!(record.is_valid());
        assert!(record.unlimited_statements());
    }

    #[test]
    fn test_default_record_invalid() {
        assert!(!LicenseRecord::default().is_valid());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(valid_record()).unwrap();
        for field in [
            "license_key",
            "current_timestamp",
            "expiry_timestamp",
            "number_of_users",
            "number_of_statements",
            "role",
            "used_statements",
            "system_up_time",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn test_masked_key() {
        let record = valid_record();
        let masked = record.masked_key();
        assert!(masked.ends_with("5678"));
        assert!(!masked.contains("WARDEN"));
    }
}

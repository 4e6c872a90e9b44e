//! Type definitions for post-migration verification.

use serde::Serialize;

/// Comparison of one target table against the records it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableVerifyResult {
    pub table_name: String,

    /// Rows expected from the generic config table.
    pub source_row_count: i64,

    /// Rows actually present in the target table.
    pub target_row_count: i64,

    /// Ids present in the source but missing from the target.
    pub missing: Vec<String>,

    /// Ids present in the target with no source record.
    pub unexpected: Vec<String>,

    /// Ids whose restored config differs from the source config.
    pub mismatched: Vec<String>,
}

impl TableVerifyResult {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.source_row_count == self.target_row_count
            && self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.mismatched.is_empty()
    }
}

/// Verification of every target table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub tables: Vec<TableVerifyResult>,
    pub duration_ms: u64,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.tables.iter().all(TableVerifyResult::is_consistent)
    }

    /// Names of tables that did not verify.
    pub fn inconsistent_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| !t.is_consistent())
            .map(|t| t.table_name.as_str())
            .collect()
    }

    /// One-line description of the first differences, for error messages.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .tables
            .iter()
            .filter(|t| !t.is_consistent())
            .map(|t| {
                format!(
                    "{} (source {}, target {}, missing {}, unexpected {}, mismatched {})",
                    t.table_name,
                    t.source_row_count,
                    t.target_row_count,
                    t.missing.len(),
                    t.unexpected.len(),
                    t.mismatched.len()
                )
            })
            .collect();

        if parts.is_empty() {
            "all tables consistent".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_is_inconsistent() {
        let mut result = TableVerifyResult::new("state");
        result.source_row_count = 2;
        result.target_row_count = 1;
        assert!(!result.is_consistent());

        let report = VerifyReport {
            tables: vec![result, TableVerifyResult::new("workspace")],
            duration_ms: 0,
        };
        assert_eq!(report.inconsistent_tables(), vec!["state"]);
        assert!(report.summary().starts_with("state (source 2, target 1"));
    }
}

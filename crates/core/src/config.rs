//! Audit parameters.

use crate::threat::RiskTable;

/// Parameters controlling one audit run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditOptions {
    /// Deepest allowed nesting of arrays and dictionaries. Deeper input
    /// aborts the run.
    pub max_nesting: usize,

    /// Return one-element arrays as their only element. Off by default;
    /// some older consumers relied on it.
    pub collapse_single_arrays: bool,

    /// Use the structure scan's offset when a declared xref offset does not
    /// point at the matching `n g obj`. When false, a contradicted declared
    /// offset is read anyway.
    pub trust_structure_scan: bool,

    /// Rules the threat pass checks every dictionary against.
    pub risk_table: RiskTable,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            max_nesting: 256,
            collapse_single_arrays: false,
            trust_structure_scan: true,
            risk_table: RiskTable::default(),
        }
    }
}

impl AuditOptions {
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn with_collapse_single_arrays(mut self, collapse: bool) -> Self {
        self.collapse_single_arrays = collapse;
        self
    }

    pub fn with_risk_table(mut self, risk_table: RiskTable) -> Self {
        self.risk_table = risk_table;
        self
    }
}

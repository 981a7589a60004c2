//! Maps the captured columns of a load profile to the positions of the two reported quantities.

use serde::{Deserialize, Serialize};

use crate::cosem::{CapturedColumn, ObjectTarget};

/// Which column wins when several columns match the same target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Every match overwrites the previous one.
    #[default]
    LastMatch,
    FirstMatch,
}

/// Column positions of the primary and secondary quantities.
///
/// When a target matched no column its position is the default the caller supplied, and the
/// corresponding `*_matched` flag is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub primary: usize,
    pub secondary: usize,
    pub primary_matched: bool,
    pub secondary_matched: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnResolver {
    pub primary: ObjectTarget,
    pub secondary: ObjectTarget,
    pub strategy: ResolutionStrategy,
}

impl ColumnResolver {
    pub fn new(primary: ObjectTarget, secondary: ObjectTarget, strategy: ResolutionStrategy) -> Self {
        Self { primary, secondary, strategy }
    }

    /// Scans `columns` once, in device order.
    pub fn resolve(&self, columns: &[CapturedColumn], defaults: (usize, usize)) -> ResolvedColumns {
        let mut resolved = ResolvedColumns {
            primary: defaults.0,
            secondary: defaults.1,
            primary_matched: false,
            secondary_matched: false,
        };

        for (index, column) in columns.iter().enumerate() {
            if column.identifies(&self.primary) && self.should_record(resolved.primary_matched) {
                resolved.primary = index;
                resolved.primary_matched = true;
            }
            if column.identifies(&self.secondary) && self.should_record(resolved.secondary_matched) {
                resolved.secondary = index;
                resolved.secondary_matched = true;
            }
        }

        resolved
    }

    fn should_record(&self, already_matched: bool) -> bool {
        match self.strategy {
            ResolutionStrategy::LastMatch => true,
            ResolutionStrategy::FirstMatch => !already_matched,
        }
    }
}

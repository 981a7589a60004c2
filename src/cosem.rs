//! COSEM object model, client side.
//!
//! The reader never hosts objects; it only needs enough of the model to understand what a meter
//! reports: the association view (which objects exist), and the profile generic attributes it
//! reads (capture objects, entry counts and buffer rows).

use serde::{Deserialize, Serialize};

use crate::obis_code::ObisCode;

pub mod object_list;
pub mod profile_generic;

pub use object_list::{AssociationView, ObjectDescriptor};
pub use profile_generic::{CaptureObjectDefinition, CapturedColumn, LoadProfile, RangeDescriptor, Row};

pub const ASSOCIATION_SN_CLASS_ID: u16 = 12;
pub const ASSOCIATION_LN_CLASS_ID: u16 = 15;
pub const PROFILE_GENERIC_CLASS_ID: u16 = 7;
pub const CLOCK_CLASS_ID: u16 = 8;

/// Error raised when a value read from a meter does not have the shape its attribute requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectModelError {
    #[error("{what}: expected {expected}, found {found}")]
    TypeUnmatched { what: &'static str, expected: &'static str, found: String },
}

impl ObjectModelError {
    pub(crate) fn unmatched(what: &'static str, expected: &'static str, found: &crate::data::Data) -> Self {
        ObjectModelError::TypeUnmatched { what, expected, found: format!("{:?}", found.data_type()) }
    }
}

/// Identifies an object either by logical name or by short name.
///
/// An object matches when either addressing scheme matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTarget {
    pub logical_name: ObisCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<u16>,
}

impl ObjectTarget {
    pub const fn new(logical_name: ObisCode, short_name: Option<u16>) -> Self {
        Self { logical_name, short_name }
    }

    pub fn matches(&self, logical_name: &ObisCode, short_name: Option<u16>) -> bool {
        *logical_name == self.logical_name || (short_name.is_some() && short_name == self.short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_target_matches_either_scheme() {
        let target = ObjectTarget::new(ObisCode::new(1, 1, 1, 29, 1, 255), Some(7216));

        assert!(target.matches(&ObisCode::new(1, 1, 1, 29, 1, 255), None));
        assert!(target.matches(&ObisCode::new(0, 0, 0, 0, 0, 0), Some(7216)));
        assert!(!target.matches(&ObisCode::new(1, 1, 3, 29, 1, 255), Some(7368)));
    }

    #[test]
    fn test_object_target_without_short_name_ignores_missing_short_names() {
        let target = ObjectTarget::new(ObisCode::new(1, 1, 1, 29, 1, 255), None);
        assert!(!target.matches(&ObisCode::new(1, 1, 3, 29, 1, 255), None));
    }
}

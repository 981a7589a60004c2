//! ProfileGeneric (Class 7), as seen by a reading client.
//!
//! ## Attributes read
//!
//! | id | name             | type                                   |
//! |----|------------------|----------------------------------------|
//! | 2  | buffer           | array of structures, one per row       |
//! | 3  | capture_objects  | array of capture object definitions    |
//! | 7  | entries_in_use   | double-long-unsigned                   |
//! | 8  | profile_entries  | double-long-unsigned                   |
//!
//! Rows are read with selective access by range (selector 1), restricted on the clock column.

use chrono::NaiveDateTime;

use super::object_list::{logical_name, long_unsigned};
use super::{AssociationView, CLOCK_CLASS_ID, ObjectDescriptor, ObjectModelError, ObjectTarget};
use crate::data::{CoercionError, Data, DateTime};
use crate::get::AccessSelector;
use crate::obis_code::{CLOCK, ObisCode};

pub const ATTR_BUFFER: i8 = 2;
pub const ATTR_CAPTURE_OBJECTS: i8 = 3;
pub const ATTR_ENTRIES_IN_USE: i8 = 7;
pub const ATTR_PROFILE_ENTRIES: i8 = 8;

/// Selective access "by range".
pub const RANGE_SELECTOR: u8 = 1;

/// Capture object definition
///
/// Each definition is one column of the buffer. Encoded as a structure of
/// `{class_id: long-unsigned, logical_name: octet-string, attribute_index: integer,
/// data_index: long-unsigned}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureObjectDefinition {
    pub class_id: u16,
    pub logical_name: ObisCode,
    /// Attribute index to capture (1-based)
    pub attribute_index: i8,
    /// Data index within compound attributes (0 = entire value)
    pub data_index: u16,
}

impl CaptureObjectDefinition {
    /// Clock time attribute, the usual first column of a load profile.
    pub fn clock() -> Self {
        Self { class_id: CLOCK_CLASS_ID, logical_name: CLOCK, attribute_index: 2, data_index: 0 }
    }

    pub fn from_data(value: &Data) -> Result<Self, ObjectModelError> {
        let fields = match value {
            Data::Structure(fields) if fields.len() == 4 => fields,
            other => return Err(ObjectModelError::unmatched("capture object", "4-field structure", other)),
        };

        let class_id = long_unsigned(&fields[0], "class_id")?;
        let logical_name = logical_name(&fields[1])?;
        let attribute_index = match &fields[2] {
            Data::Integer(v) => *v,
            Data::Unsigned(v) => *v as i8,
            other => return Err(ObjectModelError::unmatched("attribute_index", "integer", other)),
        };
        let data_index = long_unsigned(&fields[3], "data_index")?;

        Ok(Self { class_id, logical_name, attribute_index, data_index })
    }

    pub fn to_data(&self) -> Data {
        Data::Structure(vec![
            Data::LongUnsigned(self.class_id),
            Data::OctetString(self.logical_name.encode().to_vec()),
            Data::Integer(self.attribute_index),
            Data::LongUnsigned(self.data_index),
        ])
    }

    /// Parses the capture_objects attribute.
    pub fn parse_list(value: &Data) -> Result<Vec<Self>, ObjectModelError> {
        value
            .elements()
            .ok_or_else(|| ObjectModelError::unmatched("capture_objects", "array", value))?
            .iter()
            .map(Self::from_data)
            .collect()
    }
}

/// A capture object enriched with what the association view knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedColumn {
    pub definition: CaptureObjectDefinition,
    pub short_name: Option<u16>,
    pub description: String,
}

impl CapturedColumn {
    pub fn new(definition: CaptureObjectDefinition, view: &AssociationView) -> Self {
        let (short_name, description) = match view.find_by_logical_name(&definition.logical_name) {
            Some(object) => (object.short_name, object.description.clone()),
            None => (None, definition.logical_name.describe()),
        };
        Self { definition, short_name, description }
    }

    pub fn logical_name(&self) -> &ObisCode {
        &self.definition.logical_name
    }

    pub fn name(&self) -> String {
        self.definition.logical_name.to_dotted()
    }

    pub fn identifies(&self, target: &ObjectTarget) -> bool {
        target.matches(&self.definition.logical_name, self.short_name)
    }
}

/// The load profile targeted by an extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProfile {
    pub descriptor: ObjectDescriptor,
    /// Device-reported order; defines the position of each value in a row.
    pub columns: Vec<CapturedColumn>,
    pub entries_in_use: u64,
    pub profile_entries: u64,
}

impl LoadProfile {
    pub fn new(descriptor: ObjectDescriptor) -> Self {
        Self { descriptor, columns: Vec::new(), entries_in_use: 0, profile_entries: 0 }
    }

    pub fn logical_name(&self) -> &ObisCode {
        &self.descriptor.logical_name
    }

    pub fn set_capture_objects(&mut self, definitions: Vec<CaptureObjectDefinition>, view: &AssociationView) {
        self.columns = definitions.into_iter().map(|definition| CapturedColumn::new(definition, view)).collect();
    }

    /// Column used to restrict range reads: the first column when it is a clock.
    pub fn restricting_column(&self) -> CaptureObjectDefinition {
        self.columns
            .first()
            .map(|column| &column.definition)
            .filter(|definition| definition.class_id == CLOCK_CLASS_ID)
            .cloned()
            .unwrap_or_else(CaptureObjectDefinition::clock)
    }
}

/// Range descriptor for selective access by range.
///
/// ```text
/// structure {
///     restricting_object: capture object definition,
///     from_value: date-time (octet-string),
///     to_value: date-time (octet-string),
///     selected_values: array of capture object definitions (empty = all columns)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeDescriptor {
    pub restricting_object: CaptureObjectDefinition,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub selected_values: Vec<CaptureObjectDefinition>,
}

impl RangeDescriptor {
    pub fn new(profile: &LoadProfile, from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self { restricting_object: profile.restricting_column(), from, to, selected_values: Vec::new() }
    }

    pub fn to_data(&self) -> Data {
        Data::Structure(vec![
            self.restricting_object.to_data(),
            Data::OctetString(DateTime::from_naive(self.from).encode()),
            Data::OctetString(DateTime::from_naive(self.to).encode()),
            Data::Array(self.selected_values.iter().map(CaptureObjectDefinition::to_data).collect()),
        ])
    }

    pub fn access_selector(&self) -> AccessSelector {
        AccessSelector { selector: RANGE_SELECTOR, parameters: self.to_data() }
    }
}

/// One buffered sample, positionally aligned with the profile columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<Data>);

impl Row {
    pub fn value(&self, index: usize) -> Option<&Data> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The capture time, always at position 0.
    pub fn timestamp(&self) -> Result<NaiveDateTime, CoercionError> {
        self.0.first().unwrap_or(&Data::Null).to_date_time()
    }

    /// Splits a buffer attribute into rows.
    pub fn parse_buffer(buffer: &Data) -> Result<Vec<Row>, ObjectModelError> {
        let entries = match buffer {
            Data::Array(entries) => entries,
            other => return Err(ObjectModelError::unmatched("buffer", "array", other)),
        };

        entries
            .iter()
            .map(|entry| match entry {
                Data::Structure(values) => Ok(Row(values.clone())),
                other => Err(ObjectModelError::unmatched("buffer entry", "structure", other)),
            })
            .collect()
    }
}

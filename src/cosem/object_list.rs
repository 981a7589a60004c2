//! Association view (object_list attribute of the association objects).
//!
//! Association LN (class 15) reports each object as
//! `{class_id: long-unsigned, version: unsigned, logical_name: octet-string, access_rights}`;
//! association SN (class 12) as `{base_name: long, class_id, version, logical_name}`.

use serde::{Deserialize, Serialize};

use super::{ObjectModelError, ObjectTarget, PROFILE_GENERIC_CLASS_ID};
use crate::data::Data;
use crate::obis_code::ObisCode;

/// One entry of the association view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub class_id: u16,
    pub version: u8,
    pub logical_name: ObisCode,
    /// Base name, only known when the view came from an SN association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<u16>,
    #[serde(default)]
    pub description: String,
}

impl ObjectDescriptor {
    pub fn new(class_id: u16, version: u8, logical_name: ObisCode, short_name: Option<u16>) -> Self {
        Self { class_id, version, logical_name, short_name, description: logical_name.describe() }
    }

    /// Parses an object_list element of an Association LN.
    pub fn from_ln_entry(entry: &Data) -> Result<Self, ObjectModelError> {
        let fields = structure_fields(entry, "object list entry", 3)?;
        let class_id = long_unsigned(&fields[0], "class_id")?;
        let version = unsigned(&fields[1], "version")?;
        let logical_name = logical_name(&fields[2])?;

        Ok(Self::new(class_id, version, logical_name, None))
    }

    /// Parses an object_list element of an Association SN.
    pub fn from_sn_entry(entry: &Data) -> Result<Self, ObjectModelError> {
        let fields = structure_fields(entry, "object list entry", 4)?;
        let short_name = long_unsigned(&fields[0], "base_name")?;
        let class_id = long_unsigned(&fields[1], "class_id")?;
        let version = unsigned(&fields[2], "version")?;
        let logical_name = logical_name(&fields[3])?;

        Ok(Self::new(class_id, version, logical_name, Some(short_name)))
    }

    pub fn is_profile_generic(&self) -> bool {
        self.class_id == PROFILE_GENERIC_CLASS_ID
    }

    /// Display name, the dotted logical name.
    pub fn name(&self) -> String {
        self.logical_name.to_dotted()
    }
}

fn structure_fields<'a>(
    entry: &'a Data,
    what: &'static str,
    min_len: usize,
) -> Result<&'a [Data], ObjectModelError> {
    match entry {
        Data::Structure(fields) if fields.len() >= min_len => Ok(fields),
        other => Err(ObjectModelError::unmatched(what, "structure", other)),
    }
}

pub(crate) fn long_unsigned(value: &Data, what: &'static str) -> Result<u16, ObjectModelError> {
    match value {
        Data::LongUnsigned(v) => Ok(*v),
        Data::Long(v) => Ok(*v as u16),
        Data::Unsigned(v) => Ok(u16::from(*v)),
        other => Err(ObjectModelError::unmatched(what, "long-unsigned", other)),
    }
}

fn unsigned(value: &Data, what: &'static str) -> Result<u8, ObjectModelError> {
    match value {
        Data::Unsigned(v) => Ok(*v),
        other => Err(ObjectModelError::unmatched(what, "unsigned", other)),
    }
}

pub(crate) fn logical_name(value: &Data) -> Result<ObisCode, ObjectModelError> {
    value
        .to_obis_code()
        .map_err(|_| ObjectModelError::unmatched("logical_name", "6-byte octet-string", value))
}

/// The meter's catalog of accessible objects, in device order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationView {
    pub objects: Vec<ObjectDescriptor>,
}

impl AssociationView {
    pub fn new(objects: Vec<ObjectDescriptor>) -> Self {
        Self { objects }
    }

    /// Parses attribute 2 of an Association LN.
    pub fn parse_ln(object_list: &Data) -> Result<Self, ObjectModelError> {
        Self::parse_with(object_list, ObjectDescriptor::from_ln_entry)
    }

    /// Parses attribute 2 of an Association SN.
    pub fn parse_sn(object_list: &Data) -> Result<Self, ObjectModelError> {
        Self::parse_with(object_list, ObjectDescriptor::from_sn_entry)
    }

    fn parse_with(
        object_list: &Data,
        parse_entry: fn(&Data) -> Result<ObjectDescriptor, ObjectModelError>,
    ) -> Result<Self, ObjectModelError> {
        let entries = match object_list {
            Data::Array(entries) => entries,
            other => return Err(ObjectModelError::unmatched("object_list", "array", other)),
        };

        let objects = entries.iter().map(parse_entry).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { objects })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn profile_generics(&self) -> impl Iterator<Item = &ObjectDescriptor> {
        self.objects.iter().filter(|object| object.is_profile_generic())
    }

    /// First profile generic matching the target by short name or logical name.
    pub fn find_profile(&self, target: &ObjectTarget) -> Option<&ObjectDescriptor> {
        self.profile_generics()
            .find(|object| target.matches(&object.logical_name, object.short_name))
    }

    pub fn find_by_logical_name(&self, logical_name: &ObisCode) -> Option<&ObjectDescriptor> {
        self.objects.iter().find(|object| object.logical_name == *logical_name)
    }
}

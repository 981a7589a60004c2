//! The meter session seen by the extractor.
//!
//! [`MeterSession`] is the narrow set of reads the extraction pipeline needs. [`DlmsMeterSession`]
//! implements it over a [`DlmsClient`]; tests substitute their own implementations.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::client::{ClientError, ClientSettings, DlmsClient};
use crate::cosem::{ASSOCIATION_LN_CLASS_ID, AssociationView, LoadProfile, ObjectDescriptor, Row};
use crate::data::Data;
use crate::obis_code::CURRENT_ASSOCIATION;
use crate::transport::Transport;

/// Object list attribute of the association objects.
pub const ATTR_OBJECT_LIST: i8 = 2;

pub trait MeterSession {
    /// Reads the catalog of objects the current association can access.
    fn read_association_view(&mut self) -> Result<AssociationView, ClientError>;

    fn read_attribute(&mut self, object: &ObjectDescriptor, attribute_id: i8) -> Result<Data, ClientError>;

    /// Reads the rows of `profile` captured in `[from, to)`, in device order.
    fn read_rows_by_range(
        &mut self,
        profile: &LoadProfile,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Row>, ClientError>;

    /// Ends the session. Closing an already closed session is a no-op.
    fn close(&mut self) -> Result<(), ClientError>;
}

#[derive(Debug)]
pub struct DlmsMeterSession<T: Transport> {
    client: DlmsClient<T>,
}

impl<T: Transport> DlmsMeterSession<T> {
    /// Opens the association over `transport`.
    pub fn open(transport: T, settings: ClientSettings) -> Result<Self, ClientError> {
        let mut client = DlmsClient::new(transport, settings);
        client.connect()?;
        debug!(
            max_pdu = client.state().negotiated_max_pdu_size,
            "association established"
        );
        Ok(Self { client })
    }

    pub fn client(&self) -> &DlmsClient<T> {
        &self.client
    }
}

impl<T: Transport> MeterSession for DlmsMeterSession<T> {
    fn read_association_view(&mut self) -> Result<AssociationView, ClientError> {
        let object_list =
            self.client.read(ASSOCIATION_LN_CLASS_ID, CURRENT_ASSOCIATION, ATTR_OBJECT_LIST, None)?;
        AssociationView::parse_ln(&object_list).map_err(|e| ClientError::InvalidResponseData(e.to_string()))
    }

    fn read_attribute(&mut self, object: &ObjectDescriptor, attribute_id: i8) -> Result<Data, ClientError> {
        self.client.read(object.class_id, object.logical_name, attribute_id, None)
    }

    fn read_rows_by_range(
        &mut self,
        profile: &LoadProfile,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Row>, ClientError> {
        self.client.read_load_profile(profile, from, to)
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.client.disconnect()
    }
}

//! Synchronous DLMS client: association, GET with block transfer, release.

use chrono::NaiveDateTime;

use crate::association::{AareApdu, AarqApdu, AssociationResult, RlreApdu, RlrqApdu};
use crate::cosem::profile_generic::ATTR_BUFFER;
use crate::cosem::{LoadProfile, RangeDescriptor, Row};
use crate::data::Data;
use crate::get::{
    AccessSelector, DataAccessResult, GetDataBlockResult, GetDataResult, GetRequest, GetRequestNext,
    GetRequestNormal, GetResponse,
};
use crate::obis_code::ObisCode;
use crate::transport::Transport;

/// Size of the receive buffer; one wrapper frame can carry at most this many APDU bytes.
pub const RECV_BUFFER_SIZE: usize = 0xFFFF;

/// Invoke-id-and-priority: high priority, confirmed service.
const INVOKE_ID_PRIORITY_BITS: u8 = 0xC0;

/// Errors that can occur during client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("connection closed by the meter")]
    ConnectionClosed,
    #[error("cannot parse the {0} sent by the meter")]
    Parse(&'static str),
    #[error("association rejected: {result:?}, diagnostic {diagnostic}")]
    AssociationFailed { result: AssociationResult, diagnostic: u8 },
    #[error("not associated")]
    NotAssociated,
    #[error("data access error: {0:?}")]
    DataAccess(DataAccessResult),
    #[error("invoke id mismatch: sent {sent:#04x}, received {received:#04x}")]
    InvokeIdMismatch { sent: u8, received: u8 },
    #[error("invalid response data: {0}")]
    InvalidResponseData(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ClientError {
    pub fn transport<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        ClientError::Transport(Box::new(error))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    None,
    /// Low level security: a password sent in the AARQ.
    Low { password: Vec<u8> },
}

/// Settings for the DLMS client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Client SAP. Default: 16 (Public Client).
    pub client_address: u16,
    /// Server SAP. Default: 1 (Management Logical Device).
    pub server_address: u16,
    pub authentication: Authentication,
    /// Maximum PDU size the client can receive.
    pub max_pdu_size: u16,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            client_address: 16,
            server_address: 1,
            authentication: Authentication::None,
            max_pdu_size: 0xFFFF,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub associated: bool,
    pub negotiated_max_pdu_size: u16,
    pub negotiated_conformance: Option<[u8; 3]>,
}

#[derive(Debug)]
pub struct DlmsClient<T: Transport> {
    transport: T,
    settings: ClientSettings,
    state: SessionState,
    invoke_id: u8,
    buffer: Vec<u8>,
}

impl<T: Transport> DlmsClient<T> {
    pub fn new(transport: T, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
            state: SessionState::default(),
            invoke_id: 0,
            buffer: vec![0; RECV_BUFFER_SIZE],
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_associated(&self) -> bool {
        self.state.associated
    }

    fn generate_aarq(&self) -> AarqApdu {
        match &self.settings.authentication {
            Authentication::None => AarqApdu::new_simple_ln(self.settings.max_pdu_size),
            Authentication::Low { password } => {
                AarqApdu::new_with_password(self.settings.max_pdu_size, password.clone())
            }
        }
    }

    fn next_invoke_id(&mut self) -> u8 {
        let id = INVOKE_ID_PRIORITY_BITS | (self.invoke_id & 0x0F);
        self.invoke_id = (self.invoke_id + 1) & 0x0F;
        id
    }

    /// Sends one APDU and returns the APDU received in answer.
    fn exchange(&mut self, apdu: &[u8]) -> Result<&[u8], ClientError> {
        self.transport.send(apdu).map_err(ClientError::transport)?;

        let bytes_read = self.transport.recv(&mut self.buffer).map_err(ClientError::transport)?;
        if bytes_read == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(&self.buffer[..bytes_read])
    }

    /// Connects to the DLMS server (Association).
    ///
    /// Sends an AARQ and expects an AARE.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let aarq = self.generate_aarq().encode();
        let response = self.exchange(&aarq)?;
        let (_, aare) = AareApdu::parse(response).map_err(|_| ClientError::Parse("AARE"))?;

        if !aare.is_accepted() {
            self.state.associated = false;
            return Err(ClientError::AssociationFailed { result: aare.result, diagnostic: aare.diagnostic() });
        }

        self.state.associated = true;
        if let Some(initiate) = &aare.user_information {
            self.state.negotiated_max_pdu_size = initiate.server_max_receive_pdu_size;
            self.state.negotiated_conformance = Some(initiate.negotiated_conformance);
        }
        Ok(())
    }

    /// Releases the association. Does nothing when not associated.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        if !self.state.associated {
            return Ok(());
        }
        self.state.associated = false;

        let rlrq = RlrqApdu::normal().encode();
        match self.exchange(&rlrq) {
            Ok(response) => {
                RlreApdu::parse(response).map_err(|_| ClientError::Parse("RLRE"))?;
                Ok(())
            }
            // The meter may drop the link instead of answering.
            Err(ClientError::ConnectionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Reads a single COSEM attribute (GET service), reassembling block transfers.
    pub fn read(
        &mut self,
        class_id: u16,
        obis_code: ObisCode,
        attribute_id: i8,
        access_selection: Option<AccessSelector>,
    ) -> Result<Data, ClientError> {
        if !self.state.associated {
            return Err(ClientError::NotAssociated);
        }

        let invoke_id = self.next_invoke_id();
        let mut request = GetRequest::Normal(GetRequestNormal {
            invoke_id,
            class_id,
            instance_id: obis_code,
            attribute_id,
            access_selection,
        });

        let mut raw = Vec::new();
        let mut expected_block = 1u32;

        loop {
            let encoded = request.encode();
            let response = self.exchange(&encoded)?;
            let (_, response) = GetResponse::parse(response).map_err(|_| ClientError::Parse("GET-Response"))?;

            if response.invoke_id() & 0x0F != invoke_id & 0x0F {
                return Err(ClientError::InvokeIdMismatch { sent: invoke_id, received: response.invoke_id() });
            }

            match response {
                GetResponse::Normal(normal) => {
                    return match normal.result {
                        GetDataResult::Data(data) => Ok(data),
                        GetDataResult::DataAccessError(error) => Err(ClientError::DataAccess(error)),
                    };
                }
                GetResponse::WithDataBlock(block) => {
                    let data = match block.result {
                        GetDataBlockResult::RawData(data) => data,
                        GetDataBlockResult::DataAccessError(error) => return Err(ClientError::DataAccess(error)),
                    };
                    if block.block_number != expected_block {
                        return Err(ClientError::InvalidResponseData(format!(
                            "expected block {expected_block}, received block {}",
                            block.block_number
                        )));
                    }
                    raw.extend_from_slice(&data);

                    if block.last_block {
                        let (_, value) = Data::parse(&raw).map_err(|_| ClientError::Parse("block transfer data"))?;
                        return Ok(value);
                    }

                    request = GetRequest::NextDataBlock(GetRequestNext { invoke_id, block_number: block.block_number });
                    expected_block += 1;
                }
            }
        }
    }

    /// Reads the buffer rows captured in `[from, to)` using selective access by range.
    pub fn read_load_profile(
        &mut self,
        profile: &LoadProfile,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Row>, ClientError> {
        let range = RangeDescriptor::new(profile, from, to);
        let buffer = self.read(
            profile.descriptor.class_id,
            *profile.logical_name(),
            ATTR_BUFFER,
            Some(range.access_selector()),
        )?;

        Row::parse_buffer(&buffer).map_err(|e| ClientError::InvalidResponseData(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::association::InitiateResponse;
    use crate::association::ResultSourceDiagnostic;
    use crate::get::{GetResponseNormal, GetResponseWithDataBlock};
    use std::collections::VecDeque;
    use std::io;

    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        pub sent_data: Vec<Vec<u8>>,
        pub response_queue: VecDeque<Vec<u8>>,
    }

    impl MockTransport {
        pub fn push_response(&mut self, data: Vec<u8>) {
            self.response_queue.push_back(data);
        }

        pub fn accepting() -> Self {
            let mut transport = Self::default();
            transport.push_response(AareApdu::new_accepted(InitiateResponse::new_ln([0x00, 0x10, 0x1D], 1024)).encode());
            transport
        }
    }

    impl Transport for MockTransport {
        type Error = io::Error;

        fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.sent_data.push(data.to_vec());
            Ok(())
        }

        fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
            match self.response_queue.pop_front() {
                Some(response) => {
                    let len = response.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&response[..len]);
                    Ok(len)
                }
                None => Ok(0),
            }
        }
    }

    fn normal(invoke_id: u8, data: Data) -> Vec<u8> {
        GetResponse::Normal(GetResponseNormal { invoke_id, result: GetDataResult::Data(data) }).encode()
    }

    fn block(invoke_id: u8, block_number: u32, last_block: bool, raw: &[u8]) -> Vec<u8> {
        GetResponse::WithDataBlock(GetResponseWithDataBlock {
            invoke_id,
            last_block,
            block_number,
            result: GetDataBlockResult::RawData(raw.to_vec()),
        })
        .encode()
    }

    fn connected(transport: MockTransport) -> DlmsClient<MockTransport> {
        let mut client = DlmsClient::new(transport, ClientSettings::default());
        client.connect().unwrap();
        client
    }

    #[test]
    fn test_connect_records_negotiated_parameters() {
        let client = connected(MockTransport::accepting());

        assert!(client.is_associated());
        assert_eq!(client.state().negotiated_max_pdu_size, 1024);
        assert_eq!(client.state().negotiated_conformance, Some([0x00, 0x10, 0x1D]));
        assert_eq!(client.transport().sent_data[0][0], 0x60);
    }

    #[test]
    fn test_connect_sends_password() {
        let settings = ClientSettings {
            authentication: Authentication::Low { password: b"00000000".to_vec() },
            ..ClientSettings::default()
        };
        let mut client = DlmsClient::new(MockTransport::accepting(), settings);
        client.connect().unwrap();

        let aarq = &client.transport().sent_data[0];
        assert!(aarq.windows(10).any(|w| w == [0x80, 0x08, b'0', b'0', b'0', b'0', b'0', b'0', b'0', b'0']));
    }

    #[test]
    fn test_connect_rejected() {
        let mut transport = MockTransport::default();
        transport.push_response(
            AareApdu::new_rejected(AssociationResult::RejectedPermanent, ResultSourceDiagnostic::ServiceUser(13))
                .encode(),
        );
        let mut client = DlmsClient::new(transport, ClientSettings::default());

        let result = client.connect();
        assert!(matches!(
            result,
            Err(ClientError::AssociationFailed { result: AssociationResult::RejectedPermanent, diagnostic: 13 })
        ));
        assert!(!client.is_associated());
    }

    #[test]
    fn test_connect_connection_closed() {
        let mut client = DlmsClient::new(MockTransport::default(), ClientSettings::default());
        assert!(matches!(client.connect(), Err(ClientError::ConnectionClosed)));
    }

    #[test]
    fn test_read_requires_association() {
        let mut client = DlmsClient::new(MockTransport::default(), ClientSettings::default());
        assert!(matches!(
            client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 7, None),
            Err(ClientError::NotAssociated)
        ));
    }

    #[test]
    fn test_read_deeply_nested_response_is_a_parse_error() {
        let mut response = vec![0xC4, 0x01, 0xC0, 0x00];
        response.extend([0x01, 0x01].repeat(20_000));
        response.push(0x00);
        let mut transport = MockTransport::accepting();
        transport.push_response(response);
        let mut client = connected(transport);

        assert!(matches!(
            client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 2, None),
            Err(ClientError::Parse(_))
        ));
    }

    #[test]
    fn test_read_normal() {
        let mut transport = MockTransport::accepting();
        transport.push_response(normal(0xC0, Data::DoubleLongUnsigned(96)));
        let mut client = connected(transport);

        let value = client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 7, None).unwrap();

        assert_eq!(value, Data::DoubleLongUnsigned(96));
        assert_eq!(
            client.transport().sent_data[1],
            vec![0xC0, 0x01, 0xC0, 0x00, 0x07, 0x01, 0x00, 0x63, 0x01, 0x00, 0xFF, 0x07, 0x00]
        );
    }

    #[test]
    fn test_read_data_access_error() {
        let mut transport = MockTransport::accepting();
        transport.push_response(
            GetResponse::Normal(GetResponseNormal {
                invoke_id: 0xC0,
                result: GetDataResult::DataAccessError(DataAccessResult::ReadWriteDenied),
            })
            .encode(),
        );
        let mut client = connected(transport);

        assert!(matches!(
            client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 2, None),
            Err(ClientError::DataAccess(DataAccessResult::ReadWriteDenied))
        ));
    }

    #[test]
    fn test_read_invoke_id_mismatch() {
        let mut transport = MockTransport::accepting();
        transport.push_response(normal(0xC5, Data::Null));
        let mut client = connected(transport);

        assert!(matches!(
            client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 2, None),
            Err(ClientError::InvokeIdMismatch { sent: 0xC0, received: 0xC5 })
        ));
    }

    #[test]
    fn test_invoke_ids_increment() {
        let mut transport = MockTransport::accepting();
        transport.push_response(normal(0xC0, Data::Null));
        transport.push_response(normal(0xC1, Data::Null));
        let mut client = connected(transport);

        client.read(1, ObisCode::new(0, 0, 96, 1, 0, 255), 2, None).unwrap();
        client.read(1, ObisCode::new(0, 0, 96, 1, 0, 255), 2, None).unwrap();

        assert_eq!(client.transport().sent_data[2][2], 0xC1);
    }

    #[test]
    fn test_read_block_transfer() {
        let encoded = Data::Array(vec![Data::Unsigned(1), Data::Unsigned(2), Data::Unsigned(3)]).encode();
        let (first, second) = encoded.split_at(3);

        let mut transport = MockTransport::accepting();
        transport.push_response(block(0xC0, 1, false, first));
        transport.push_response(block(0xC0, 2, true, second));
        let mut client = connected(transport);

        let value = client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 2, None).unwrap();

        assert_eq!(value, Data::Array(vec![Data::Unsigned(1), Data::Unsigned(2), Data::Unsigned(3)]));
        assert_eq!(client.transport().sent_data[2], vec![0xC0, 0x02, 0xC0, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_read_block_transfer_out_of_order() {
        let mut transport = MockTransport::accepting();
        transport.push_response(block(0xC0, 2, true, &[0x00]));
        let mut client = connected(transport);

        assert!(matches!(
            client.read(7, ObisCode::new(1, 0, 99, 1, 0, 255), 2, None),
            Err(ClientError::InvalidResponseData(_))
        ));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut transport = MockTransport::accepting();
        transport.push_response(RlreApdu { reason: Some(0) }.encode());
        let mut client = connected(transport);

        client.disconnect().unwrap();
        client.disconnect().unwrap();

        assert!(!client.is_associated());
        assert_eq!(client.transport().sent_data.len(), 2);
        assert_eq!(client.transport().sent_data[1], vec![0x62, 0x03, 0x80, 0x01, 0x00]);
    }

    #[test]
    fn test_disconnect_tolerates_dropped_link() {
        let mut client = connected(MockTransport::accepting());
        assert!(client.disconnect().is_ok());
        assert!(!client.is_associated());
    }

    #[test]
    fn test_read_load_profile_uses_range_selector() {
        use crate::cosem::ObjectDescriptor;
        use chrono::NaiveDate;

        let day = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap();
        let buffer = Data::Array(vec![Data::Structure(vec![
            Data::OctetString(crate::data::DateTime::from_naive(day.and_hms_opt(1, 0, 0).unwrap()).encode()),
            Data::DoubleLongUnsigned(10),
        ])]);
        let mut transport = MockTransport::accepting();
        transport.push_response(normal(0xC0, buffer));
        let mut client = connected(transport);

        let profile = LoadProfile::new(ObjectDescriptor::new(7, 1, ObisCode::new(1, 0, 99, 1, 0, 255), None));
        let rows = client
            .read_load_profile(&profile, day.and_hms_opt(1, 0, 0).unwrap(), day.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap())
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value(1), Some(&Data::DoubleLongUnsigned(10)));
        let request = &client.transport().sent_data[1];
        assert_eq!(&request[11..14], &[0x02, 0x01, 0x01]);
    }

    #[test]
    fn test_read_load_profile_rejects_non_array_buffer() {
        use crate::cosem::ObjectDescriptor;
        use chrono::NaiveDate;

        let mut transport = MockTransport::accepting();
        transport.push_response(normal(0xC0, Data::Null));
        let mut client = connected(transport);

        let day = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let profile = LoadProfile::new(ObjectDescriptor::new(7, 1, ObisCode::new(1, 0, 99, 1, 0, 255), None));

        assert!(matches!(
            client.read_load_profile(&profile, day, day),
            Err(ClientError::InvalidResponseData(_))
        ));
    }
}

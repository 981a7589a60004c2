//! Association layer (ACSE) for logical name referencing.
//!
//! The association establishment follows this sequence:
//! 1. Client sends AARQ APDU (tag 0x60) containing:
//!    - Application context (LN, no ciphering)
//!    - Authentication mechanism and password when low level security is used
//!    - xDLMS InitiateRequest with conformance and PDU size
//! 2. Server responds with AARE APDU (tag 0x61) containing:
//!    - Association result (accepted/rejected)
//!    - Diagnostic information if rejected
//!    - xDLMS InitiateResponse with negotiated parameters
//!
//! Releasing sends RLRQ (0x62) and expects RLRE (0x63).

use derive_try_from_primitive::TryFromPrimitive;
use nom::{
    IResult,
    error::{Error, ErrorKind},
    number::complete::{be_u16, u8},
};

pub use self::{
    aare::{AareApdu, ResultSourceDiagnostic},
    aarq::AarqApdu,
    release::{RlreApdu, RlrqApdu},
};

mod aare;
mod aarq;
mod ber;
mod release;

pub const AARQ_TAG: u8 = 0x60;
pub const AARE_TAG: u8 = 0x61;
pub const RLRQ_TAG: u8 = 0x62;
pub const RLRE_TAG: u8 = 0x63;

/// xDLMS VAA name for Logical Name referencing
pub const VAA_NAME_LN: u16 = 0x0007;

/// xDLMS VAA name for Short Name referencing
pub const VAA_NAME_SN: u16 = 0xFA00;

pub const DLMS_VERSION: u8 = 6;

/// Proposed conformance: get, set, selective access, action, block transfer with get.
pub const CLIENT_CONFORMANCE: [u8; 3] = [0x00, 0x7E, 0x1F];

const INITIATE_REQUEST_TAG: u8 = 0x01;
const INITIATE_RESPONSE_TAG: u8 = 0x08;
const CONFORMANCE_TAG: [u8; 2] = [0x5F, 0x1F];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationContextName {
    LogicalNameReferencing,
    ShortNameReferencing,
}

impl ApplicationContextName {
    pub fn oid_bytes(&self) -> &'static [u8] {
        match self {
            ApplicationContextName::LogicalNameReferencing => &[0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01],
            ApplicationContextName::ShortNameReferencing => &[0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x02],
        }
    }

    pub fn from_oid_bytes(bytes: &[u8]) -> Option<Self> {
        [Self::LogicalNameReferencing, Self::ShortNameReferencing]
            .into_iter()
            .find(|name| name.oid_bytes() == bytes)
    }
}

/// Authentication mechanism names supported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismName {
    LowestLevelSecurity,
    LowLevelSecurity,
}

impl MechanismName {
    pub fn oid_bytes(&self) -> &'static [u8] {
        match self {
            MechanismName::LowestLevelSecurity => &[0x60, 0x85, 0x74, 0x05, 0x08, 0x02, 0x00],
            MechanismName::LowLevelSecurity => &[0x60, 0x85, 0x74, 0x05, 0x08, 0x02, 0x01],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AssociationResult {
    Accepted = 0,
    RejectedPermanent = 1,
    RejectedTransient = 2,
}

/// xDLMS InitiateRequest, carried in the AARQ user-information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub proposed_conformance: [u8; 3],
    pub client_max_receive_pdu_size: u16,
}

impl InitiateRequest {
    pub fn new(client_max_receive_pdu_size: u16) -> Self {
        Self { proposed_conformance: CLIENT_CONFORMANCE, client_max_receive_pdu_size }
    }

    /// `01 00 00 00 06 5F 1F 04 00 <conformance> <max pdu>`: no dedicated key, response allowed,
    /// no proposed quality of service.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![INITIATE_REQUEST_TAG, 0x00, 0x00, 0x00, DLMS_VERSION];
        buf.extend_from_slice(&CONFORMANCE_TAG);
        buf.extend_from_slice(&[0x04, 0x00]);
        buf.extend_from_slice(&self.proposed_conformance);
        buf.extend_from_slice(&self.client_max_receive_pdu_size.to_be_bytes());
        buf
    }
}

/// xDLMS InitiateResponse, carried in the AARE user-information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateResponse {
    pub negotiated_dlms_version: u8,
    pub negotiated_conformance: [u8; 3],
    pub server_max_receive_pdu_size: u16,
    pub vaa_name: u16,
}

impl InitiateResponse {
    pub fn new_ln(negotiated_conformance: [u8; 3], server_max_receive_pdu_size: u16) -> Self {
        Self {
            negotiated_dlms_version: DLMS_VERSION,
            negotiated_conformance,
            server_max_receive_pdu_size,
            vaa_name: VAA_NAME_LN,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![INITIATE_RESPONSE_TAG, 0x00, self.negotiated_dlms_version];
        buf.extend_from_slice(&CONFORMANCE_TAG);
        buf.extend_from_slice(&[0x04, 0x00]);
        buf.extend_from_slice(&self.negotiated_conformance);
        buf.extend_from_slice(&self.server_max_receive_pdu_size.to_be_bytes());
        buf.extend_from_slice(&self.vaa_name.to_be_bytes());
        buf
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, tag) = u8(input)?;
        if tag != INITIATE_RESPONSE_TAG {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
        }

        // negotiated-quality-of-service is optional
        let (mut input, qos_present) = u8(input)?;
        if qos_present != 0x00 {
            let (rest, _qos) = u8(input)?;
            input = rest;
        }

        let (input, negotiated_dlms_version) = u8(input)?;
        let (input, tag_hi) = u8(input)?;
        let (input, tag_lo) = u8(input)?;
        if [tag_hi, tag_lo] != CONFORMANCE_TAG {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
        }
        let (input, _length) = u8(input)?;
        let (input, _unused_bits) = u8(input)?;
        let (input, c0) = u8(input)?;
        let (input, c1) = u8(input)?;
        let (input, c2) = u8(input)?;
        let (input, server_max_receive_pdu_size) = be_u16(input)?;
        let (input, vaa_name) = be_u16(input)?;

        Ok((
            input,
            Self {
                negotiated_dlms_version,
                negotiated_conformance: [c0, c1, c2],
                server_max_receive_pdu_size,
                vaa_name,
            },
        ))
    }
}

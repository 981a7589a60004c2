//! GET service (logical name referencing).
//!
//! # APDU Tags
//! - GET-Request: 0xC0 (192)
//! - GET-Response: 0xC4 (196)
//!
//! Only the normal and next-data-block request forms are produced; responses may come back as a
//! normal result or as a sequence of data blocks that the client reassembles.

use derive_try_from_primitive::TryFromPrimitive;
use nom::{
    IResult,
    error::{Error, ErrorKind},
    number::complete::{be_u32, u8},
};

use crate::data::{Data, encode_length, parse_length};
use crate::obis_code::ObisCode;

pub const GET_REQUEST_TAG: u8 = 0xC0;
pub const GET_RESPONSE_TAG: u8 = 0xC4;

/// GET service request types.
#[derive(Debug, Clone, PartialEq)]
pub enum GetRequest {
    /// GET-Request-Normal: read a single attribute (choice 0x01)
    Normal(GetRequestNormal),
    /// GET-Request-Next: continue a block transfer (choice 0x02)
    NextDataBlock(GetRequestNext),
}

/// GET-Request-Normal
///
/// ```text
/// C0 01 C1 00 07 01 00 63 01 00 FF 02 01 01 <range descriptor>
/// │  │  │  └───┘ └───────────────┘ │  │  └── selector
/// │  │  │    │           │         │  └───── access selection present
/// │  │  │    │           │         └──────── attribute_id
/// │  │  │    │           └────────────────── instance_id (OBIS code)
/// │  │  │    └────────────────────────────── class_id
/// │  │  └─────────────────────────────────── invoke_id and priority
/// │  └────────────────────────────────────── choice: Normal
/// └───────────────────────────────────────── tag: GET-Request
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequestNormal {
    pub invoke_id: u8,
    pub class_id: u16,
    pub instance_id: ObisCode,
    pub attribute_id: i8,
    pub access_selection: Option<AccessSelector>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRequestNext {
    pub invoke_id: u8,
    pub block_number: u32,
}

/// Selective access descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessSelector {
    /// Selector 1 is "by range", selector 2 "by entry".
    pub selector: u8,
    pub parameters: Data,
}

/// GET service response types.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResponse {
    Normal(GetResponseNormal),
    WithDataBlock(GetResponseWithDataBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetResponseNormal {
    pub invoke_id: u8,
    pub result: GetDataResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetResponseWithDataBlock {
    pub invoke_id: u8,
    pub last_block: bool,
    pub block_number: u32,
    pub result: GetDataBlockResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetDataResult {
    Data(Data),
    DataAccessError(DataAccessResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetDataBlockResult {
    /// A fragment of the encoded attribute value.
    RawData(Vec<u8>),
    DataAccessError(DataAccessResult),
}

/// Data access result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum DataAccessResult {
    Success = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    ObjectUndefined = 4,
    ObjectClassInconsistent = 9,
    ObjectUnavailable = 11,
    TypeUnmatched = 12,
    ScopeOfAccessViolated = 13,
    DataBlockUnavailable = 14,
    LongGetAborted = 15,
    NoLongGetInProgress = 16,
    LongSetAborted = 17,
    NoLongSetInProgress = 18,
    DataBlockNumberInvalid = 19,
    OtherReason = 250,
}

impl GetRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![GET_REQUEST_TAG];

        match self {
            GetRequest::Normal(req) => {
                buf.push(0x01);
                buf.push(req.invoke_id);
                buf.extend_from_slice(&req.class_id.to_be_bytes());
                buf.extend_from_slice(&req.instance_id.encode());
                buf.push(req.attribute_id as u8);

                if let Some(access) = &req.access_selection {
                    buf.push(0x01);
                    buf.push(access.selector);
                    buf.extend_from_slice(&access.parameters.encode());
                } else {
                    buf.push(0x00);
                }
            }
            GetRequest::NextDataBlock(req) => {
                buf.push(0x02);
                buf.push(req.invoke_id);
                buf.extend_from_slice(&req.block_number.to_be_bytes());
            }
        }

        buf
    }
}

fn parse_access_result(input: &[u8]) -> IResult<&[u8], DataAccessResult> {
    let (rest, code) = u8(input)?;
    let result = DataAccessResult::try_from(code)
        .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Verify)))?;
    Ok((rest, result))
}

impl GetResponse {
    pub fn invoke_id(&self) -> u8 {
        match self {
            GetResponse::Normal(resp) => resp.invoke_id,
            GetResponse::WithDataBlock(resp) => resp.invoke_id,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, tag) = u8(input)?;
        if tag != GET_RESPONSE_TAG {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
        }
        let (input, choice) = u8(input)?;

        match choice {
            0x01 => {
                let (input, invoke_id) = u8(input)?;
                let (input, result_choice) = u8(input)?;

                let (input, result) = if result_choice == 0x00 {
                    let (input, data) = Data::parse(input)?;
                    (input, GetDataResult::Data(data))
                } else {
                    let (input, error) = parse_access_result(input)?;
                    (input, GetDataResult::DataAccessError(error))
                };

                Ok((input, GetResponse::Normal(GetResponseNormal { invoke_id, result })))
            }
            0x02 => {
                let (input, invoke_id) = u8(input)?;
                let (input, last_block) = u8(input)?;
                let (input, block_number) = be_u32(input)?;
                let (input, result_choice) = u8(input)?;

                let (input, result) = if result_choice == 0x00 {
                    let (input, len) = parse_length(input)?;
                    if input.len() < len {
                        return Err(nom::Err::Error(Error::new(input, ErrorKind::Eof)));
                    }
                    let (raw, rest) = input.split_at(len);
                    (rest, GetDataBlockResult::RawData(raw.to_vec()))
                } else {
                    let (input, error) = parse_access_result(input)?;
                    (input, GetDataBlockResult::DataAccessError(error))
                };

                Ok((
                    input,
                    GetResponse::WithDataBlock(GetResponseWithDataBlock {
                        invoke_id,
                        last_block: last_block != 0x00,
                        block_number,
                        result,
                    }),
                ))
            }
            _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Switch))),
        }
    }

    /// Encodes the response, as a meter would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![GET_RESPONSE_TAG];

        match self {
            GetResponse::Normal(resp) => {
                buf.push(0x01);
                buf.push(resp.invoke_id);
                match &resp.result {
                    GetDataResult::Data(data) => {
                        buf.push(0x00);
                        buf.extend_from_slice(&data.encode());
                    }
                    GetDataResult::DataAccessError(error) => {
                        buf.push(0x01);
                        buf.push(*error as u8);
                    }
                }
            }
            GetResponse::WithDataBlock(resp) => {
                buf.push(0x02);
                buf.push(resp.invoke_id);
                buf.push(u8::from(resp.last_block));
                buf.extend_from_slice(&resp.block_number.to_be_bytes());
                match &resp.result {
                    GetDataBlockResult::RawData(raw) => {
                        buf.push(0x00);
                        encode_length(raw.len(), &mut buf);
                        buf.extend_from_slice(raw);
                    }
                    GetDataBlockResult::DataAccessError(error) => {
                        buf.push(0x01);
                        buf.push(*error as u8);
                    }
                }
            }
        }

        buf
    }
}

//! RLRQ / RLRE APDUs (association release)

use nom::IResult;

use super::ber::{context_primitive, encode_tlv, parse_expected, parse_tlv};
use super::{RLRE_TAG, RLRQ_TAG};

/// Release request reasons
pub const RELEASE_REASON_NORMAL: u8 = 0;

/// RLRQ APDU - Tag 0x62
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlrqApdu {
    pub reason: Option<u8>,
}

impl RlrqApdu {
    pub fn normal() -> Self {
        Self { reason: Some(RELEASE_REASON_NORMAL) }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut content = Vec::new();
        if let Some(reason) = self.reason {
            encode_tlv(context_primitive(0), &[reason], &mut content);
        }
        let mut buf = Vec::new();
        encode_tlv(RLRQ_TAG, &content, &mut buf);
        buf
    }
}

/// RLRE APDU - Tag 0x63
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlreApdu {
    pub reason: Option<u8>,
}

impl RlreApdu {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, content) = parse_expected(input, RLRE_TAG)?;

        let mut reason = None;
        if !content.is_empty() {
            let (_, (tag, value)) = parse_tlv(content)?;
            if tag == context_primitive(0) {
                reason = value.first().copied();
            }
        }

        Ok((rest, Self { reason }))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut content = Vec::new();
        if let Some(reason) = self.reason {
            encode_tlv(context_primitive(0), &[reason], &mut content);
        }
        let mut buf = Vec::new();
        encode_tlv(RLRE_TAG, &content, &mut buf);
        buf
    }
}

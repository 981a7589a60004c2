//! AARQ APDU (A-Associate Request)

use super::ber::{OCTET_STRING, OBJECT_IDENTIFIER, context_constructed, context_primitive, encode_tlv};
use super::{AARQ_TAG, ApplicationContextName, InitiateRequest, MechanismName};

/// sender-acse-requirements: bit string with the authentication functional unit set.
const SENDER_ACSE_REQUIREMENTS: [u8; 2] = [0x07, 0x80];

/// AARQ APDU - Tag 0x60
#[derive(Debug, Clone, PartialEq)]
pub struct AarqApdu {
    pub application_context_name: ApplicationContextName,
    pub mechanism_name: Option<MechanismName>,
    /// Password for low level security
    pub calling_authentication_value: Option<Vec<u8>>,
    pub user_information: InitiateRequest,
}

impl AarqApdu {
    /// AARQ without authentication
    pub fn new_simple_ln(max_pdu_size: u16) -> Self {
        Self {
            application_context_name: ApplicationContextName::LogicalNameReferencing,
            mechanism_name: None,
            calling_authentication_value: None,
            user_information: InitiateRequest::new(max_pdu_size),
        }
    }

    /// AARQ with low level security (password) authentication
    pub fn new_with_password(max_pdu_size: u16, password: Vec<u8>) -> Self {
        Self {
            mechanism_name: Some(MechanismName::LowLevelSecurity),
            calling_authentication_value: Some(password),
            ..Self::new_simple_ln(max_pdu_size)
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut content = Vec::new();

        let mut oid = Vec::new();
        encode_tlv(OBJECT_IDENTIFIER, self.application_context_name.oid_bytes(), &mut oid);
        encode_tlv(context_constructed(1), &oid, &mut content);

        if let Some(mechanism) = self.mechanism_name.filter(|m| *m != MechanismName::LowestLevelSecurity) {
            encode_tlv(context_primitive(10), &SENDER_ACSE_REQUIREMENTS, &mut content);
            encode_tlv(context_primitive(11), mechanism.oid_bytes(), &mut content);
        }

        if let Some(password) = &self.calling_authentication_value {
            let mut value = Vec::new();
            encode_tlv(context_primitive(0), password, &mut value);
            encode_tlv(context_constructed(12), &value, &mut content);
        }

        let mut user_information = Vec::new();
        encode_tlv(OCTET_STRING, &self.user_information.encode(), &mut user_information);
        encode_tlv(context_constructed(30), &user_information, &mut content);

        let mut buf = Vec::with_capacity(content.len() + 2);
        encode_tlv(AARQ_TAG, &content, &mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple_ln() {
        let encoded = AarqApdu::new_simple_ln(0xFFFF).encode();

        #[rustfmt::skip]
        let expected = vec![
            0x60, 0x1D,
            0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01,
            0xBE, 0x10, 0x04, 0x0E,
            0x01, 0x00, 0x00, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x7E, 0x1F, 0xFF, 0xFF,
        ];
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_encode_with_password() {
        let encoded = AarqApdu::new_with_password(0xFFFF, b"00000000".to_vec()).encode();

        #[rustfmt::skip]
        let auth = [
            0x8A, 0x02, 0x07, 0x80,
            0x8B, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x02, 0x01,
            0xAC, 0x0A, 0x80, 0x08, b'0', b'0', b'0', b'0', b'0', b'0', b'0', b'0',
        ];
        assert_eq!(encoded[0], AARQ_TAG);
        assert_eq!(usize::from(encoded[1]), encoded.len() - 2);
        assert_eq!(&encoded[13..13 + auth.len()], &auth);
        assert_eq!(encoded[13 + auth.len()], 0xBE);
    }
}

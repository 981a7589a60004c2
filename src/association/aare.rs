//! AARE APDU (A-Associate Response)

use nom::{
    IResult,
    error::{Error, ErrorKind},
};

use super::ber::{
    INTEGER, OBJECT_IDENTIFIER, OCTET_STRING, context_constructed, encode_tlv, parse_expected,
    parse_small_integer, parse_tlv,
};
use super::{AARE_TAG, ApplicationContextName, AssociationResult, InitiateResponse};

/// Where the diagnostic in an AARE comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSourceDiagnostic {
    /// acse-service-user, e.g. 13 = authentication failure
    ServiceUser(u8),
    ServiceProvider(u8),
}

/// AARE APDU - Tag 0x61
#[derive(Debug, Clone, PartialEq)]
pub struct AareApdu {
    pub application_context_name: Option<ApplicationContextName>,
    pub result: AssociationResult,
    pub result_source_diagnostic: ResultSourceDiagnostic,
    /// `None` when the server answered with a confirmed-service-error instead.
    pub user_information: Option<InitiateResponse>,
}

impl AareApdu {
    pub fn new_accepted(user_information: InitiateResponse) -> Self {
        Self {
            application_context_name: Some(ApplicationContextName::LogicalNameReferencing),
            result: AssociationResult::Accepted,
            result_source_diagnostic: ResultSourceDiagnostic::ServiceUser(0),
            user_information: Some(user_information),
        }
    }

    pub fn new_rejected(result: AssociationResult, diagnostic: ResultSourceDiagnostic) -> Self {
        Self {
            application_context_name: Some(ApplicationContextName::LogicalNameReferencing),
            result,
            result_source_diagnostic: diagnostic,
            user_information: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.result == AssociationResult::Accepted
    }

    pub fn diagnostic(&self) -> u8 {
        match self.result_source_diagnostic {
            ResultSourceDiagnostic::ServiceUser(code) | ResultSourceDiagnostic::ServiceProvider(code) => code,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (rest, mut content) = parse_expected(input, AARE_TAG)?;

        let mut application_context_name = None;
        let mut result = None;
        let mut result_source_diagnostic = ResultSourceDiagnostic::ServiceUser(0);
        let mut user_information = None;

        while !content.is_empty() {
            let (next, (tag, value)) = parse_tlv(content)?;
            match tag {
                0xA1 => {
                    let (_, oid) = parse_expected(value, OBJECT_IDENTIFIER)?;
                    application_context_name = ApplicationContextName::from_oid_bytes(oid);
                }
                0xA2 => {
                    let (_, code) = parse_small_integer(value)?;
                    let parsed = AssociationResult::try_from(code)
                        .map_err(|_| nom::Err::Error(Error::new(value, ErrorKind::Verify)))?;
                    result = Some(parsed);
                }
                0xA3 => {
                    let (_, (source, diagnostic)) = parse_tlv(value)?;
                    let (_, code) = parse_small_integer(diagnostic)?;
                    result_source_diagnostic = match source {
                        0xA1 => ResultSourceDiagnostic::ServiceUser(code),
                        0xA2 => ResultSourceDiagnostic::ServiceProvider(code),
                        _ => return Err(nom::Err::Error(Error::new(value, ErrorKind::Tag))),
                    };
                }
                0xBE => {
                    let (_, initiate) = parse_expected(value, OCTET_STRING)?;
                    user_information = InitiateResponse::parse(initiate).ok().map(|(_, response)| response);
                }
                // responder titles, authentication values and the like are not needed
                _ => {}
            }
            content = next;
        }

        let result = result.ok_or_else(|| nom::Err::Error(Error::new(input, ErrorKind::Complete)))?;

        Ok((rest, Self { application_context_name, result, result_source_diagnostic, user_information }))
    }

    /// Encodes the response, as a meter would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut content = Vec::new();

        if let Some(name) = self.application_context_name {
            let mut oid = Vec::new();
            encode_tlv(OBJECT_IDENTIFIER, name.oid_bytes(), &mut oid);
            encode_tlv(context_constructed(1), &oid, &mut content);
        }

        let mut result = Vec::new();
        encode_tlv(INTEGER, &[self.result as u8], &mut result);
        encode_tlv(context_constructed(2), &result, &mut content);

        let (source, code) = match self.result_source_diagnostic {
            ResultSourceDiagnostic::ServiceUser(code) => (context_constructed(1), code),
            ResultSourceDiagnostic::ServiceProvider(code) => (context_constructed(2), code),
        };
        let mut integer = Vec::new();
        encode_tlv(INTEGER, &[code], &mut integer);
        let mut diagnostic = Vec::new();
        encode_tlv(source, &integer, &mut diagnostic);
        encode_tlv(context_constructed(3), &diagnostic, &mut content);

        if let Some(initiate) = &self.user_information {
            let mut user_information = Vec::new();
            encode_tlv(OCTET_STRING, &initiate.encode(), &mut user_information);
            encode_tlv(context_constructed(30), &user_information, &mut content);
        }

        let mut buf = Vec::new();
        encode_tlv(AARE_TAG, &content, &mut buf);
        buf
    }
}

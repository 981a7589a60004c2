//! IEC 62056-47 wrapper framing, used by DLMS/COSEM over TCP/UDP.
//!
//! ```text
//! 00 01 00 10 00 01 00 0D <apdu ...>
//! └───┘ └───┘ └───┘ └───┘
//!   │     │     │     └── length of the APDU
//!   │     │     └──────── destination wPort
//!   │     └────────────── source wPort
//!   └──────────────────── version (1)
//! ```

use std::io::{self, Read, Write};

use nom::{IResult, Parser, number::complete::be_u16};

use super::Transport;

pub const WRAPPER_VERSION: u16 = 0x0001;
pub const WRAPPER_HEADER_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported wrapper version {0}")]
    InvalidVersion(u16),
    #[error("frame addressed from wPort {source_port} to wPort {destination}, expected {expected_source} to {expected_destination}")]
    UnexpectedPorts { source_port: u16, destination: u16, expected_source: u16, expected_destination: u16 },
    #[error("APDU of {needed} bytes does not fit a {available} byte buffer")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("APDU of {0} bytes is too large for a wrapper frame")]
    ApduTooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperHeader {
    pub version: u16,
    pub source: u16,
    pub destination: u16,
    pub length: u16,
}

impl WrapperHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, (version, source, destination, length)) =
            (be_u16, be_u16, be_u16, be_u16).parse(input)?;
        Ok((input, Self { version, source, destination, length }))
    }

    pub fn encode(&self) -> [u8; WRAPPER_HEADER_LEN] {
        let mut buf = [0u8; WRAPPER_HEADER_LEN];
        buf[0..2].copy_from_slice(&self.version.to_be_bytes());
        buf[2..4].copy_from_slice(&self.source.to_be_bytes());
        buf[4..6].copy_from_slice(&self.destination.to_be_bytes());
        buf[6..8].copy_from_slice(&self.length.to_be_bytes());
        buf
    }
}

/// Wrapper framed transport over any byte stream.
#[derive(Debug)]
pub struct WrapperTransport<S> {
    stream: S,
    client_wport: u16,
    server_wport: u16,
}

impl<S: Read + Write> WrapperTransport<S> {
    pub fn new(stream: S, client_wport: u16, server_wport: u16) -> Self {
        Self { stream, client_wport, server_wport }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl<S: Read + Write + std::fmt::Debug> Transport for WrapperTransport<S> {
    type Error = WrapperError;

    fn send(&mut self, apdu: &[u8]) -> Result<(), Self::Error> {
        let length = u16::try_from(apdu.len()).map_err(|_| WrapperError::ApduTooLarge(apdu.len()))?;
        let header = WrapperHeader {
            version: WRAPPER_VERSION,
            source: self.client_wport,
            destination: self.server_wport,
            length,
        };

        let mut frame = Vec::with_capacity(WRAPPER_HEADER_LEN + apdu.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(apdu);
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let mut raw = [0u8; WRAPPER_HEADER_LEN];
        match self.stream.read_exact(&mut raw) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
            Err(e) => return Err(e.into()),
        }

        let header = match WrapperHeader::parse(&raw) {
            Ok((_, header)) => header,
            Err(_) => return Err(io::Error::from(io::ErrorKind::InvalidData).into()),
        };
        if header.version != WRAPPER_VERSION {
            return Err(WrapperError::InvalidVersion(header.version));
        }
        if header.source != self.server_wport || header.destination != self.client_wport {
            return Err(WrapperError::UnexpectedPorts {
                source_port: header.source,
                destination: header.destination,
                expected_source: self.server_wport,
                expected_destination: self.client_wport,
            });
        }

        let length = usize::from(header.length);
        if length > buffer.len() {
            return Err(WrapperError::BufferTooSmall { needed: length, available: buffer.len() });
        }
        self.stream.read_exact(&mut buffer[..length])?;
        Ok(length)
    }
}

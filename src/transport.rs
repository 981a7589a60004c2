//! Transports beneath the DLMS client.

use core::fmt;

pub mod serial;
pub mod tcp;
pub mod wrapper;

pub use serial::{Parity, SerialSettings};
pub use tcp::TcpTransport;
pub use wrapper::{WrapperError, WrapperTransport};

/// Trait representing the underlying transport layer for DLMS/COSEM communication.
///
/// This trait allows the `DlmsClient` to be agnostic of the actual communication medium.
/// A transport moves whole APDUs: framing is its own business.
pub trait Transport: fmt::Debug {
    /// The error type returned by transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one APDU to the remote device.
    fn send(&mut self, apdu: &[u8]) -> Result<(), Self::Error>;

    /// Receives one APDU into `buffer`.
    ///
    /// Returns the number of bytes read; 0 means the peer closed the connection.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

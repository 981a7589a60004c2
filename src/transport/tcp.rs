//! TCP transport for DLMS/COSEM, IEC 62056-47 wrapper framed.
//!
//! The default DLMS/COSEM TCP port is **4059**, though meters behind modems and gateways are
//! often reached on other ports. Nagle's algorithm is disabled for lower latency.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::WrapperTransport;

pub const DEFAULT_DLMS_TCP_PORT: u16 = 4059;

pub const DEFAULT_TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TCP_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TCP_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub type TcpTransport = WrapperTransport<TcpStream>;

impl WrapperTransport<TcpStream> {
    /// Connects to `addr`, addressing the wrapper frames from `client_wport` to `server_wport`.
    pub fn connect<A: ToSocketAddrs>(addr: A, client_wport: u16, server_wport: u16) -> io::Result<Self> {
        let mut last_error = None;
        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, DEFAULT_TCP_CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(DEFAULT_TCP_READ_TIMEOUT))?;
                    stream.set_write_timeout(Some(DEFAULT_TCP_WRITE_TIMEOUT))?;
                    stream.set_nodelay(true)?;
                    return Ok(Self::new(stream, client_wport, server_wport));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")))
    }
}

//! Serial line settings for optical heads and RS-485 links.
//!
//! Meters that start in IEC 62056-21 mode are opened at 300 baud, 7 data bits, even parity and
//! switch to DLMS afterwards; meters answering DLMS directly use 9600 8N1. Only the settings live
//! here: the reader has no serial transport.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl SerialSettings {
    /// Line settings the meter expects at connection time.
    pub fn from_mode(port_name: impl Into<String>, iec: bool) -> Self {
        let port_name = port_name.into();
        if iec {
            Self { port_name, baud_rate: 300, data_bits: 7, parity: Parity::Even, stop_bits: 1 }
        } else {
            Self { port_name, baud_rate: 9600, data_bits: 8, parity: Parity::None, stop_bits: 1 }
        }
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(f, "{} {} {}{}{}", self.port_name, self.baud_rate, self.data_bits, parity, self.stop_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mode_iec() {
        let settings = SerialSettings::from_mode("COM3", true);
        assert_eq!(settings.baud_rate, 300);
        assert_eq!(settings.data_bits, 7);
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!(settings.to_string(), "COM3 300 7E1");
    }

    #[test]
    fn test_from_mode_direct_dlms() {
        let settings = SerialSettings::from_mode("/dev/ttyUSB0", false);
        assert_eq!(settings.to_string(), "/dev/ttyUSB0 9600 8N1");
    }
}

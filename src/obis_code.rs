use core::fmt::{self, Debug, Display};
use core::str::FromStr;

use nom::{IResult, Parser, number::complete::u8};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An OBIS code (the logical name of a COSEM object).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObisCode {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub f: u8,
}

/// The standard Clock object, `0.0.1.0.0.255`.
pub const CLOCK: ObisCode = ObisCode { a: 0, b: 0, c: 1, d: 0, e: 0, f: 255 };

/// The current Association LN object, `0.0.40.0.0.255`.
pub const CURRENT_ASSOCIATION: ObisCode = ObisCode { a: 0, b: 0, c: 40, d: 0, e: 0, f: 255 };

impl ObisCode {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, (a, b, c, d, e, f)) = (u8, u8, u8, u8, u8, u8).parse(input)?;
        Ok((input, Self::new(a, b, c, d, e, f)))
    }

    /// Builds an OBIS code from a 6-byte octet string.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [a, b, c, d, e, f] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    pub fn encode(&self) -> [u8; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Dotted notation, e.g. `1.0.99.1.0.255`.
    pub fn to_dotted(&self) -> String {
        format!("{}.{}.{}.{}.{}.{}", self.a, self.b, self.c, self.d, self.e, self.f)
    }

    /// Short human readable description for well-known codes.
    ///
    /// Returns an empty string when nothing sensible is known about the code.
    pub fn describe(&self) -> String {
        if *self == CLOCK {
            return "Clock".to_string();
        }
        if self.c == 40 && self.a == 0 {
            return "Association".to_string();
        }
        if self.c == 99 && self.a == 1 {
            return match self.d {
                1 => "Load profile with recording period 1".to_string(),
                2 => "Load profile with recording period 2".to_string(),
                98 => "Event log".to_string(),
                _ => "Profile".to_string(),
            };
        }
        if self.a != 1 {
            return String::new();
        }

        let quantity = match self.c {
            1 => "Active power+",
            2 => "Active power-",
            3 => "Reactive power+",
            4 => "Reactive power-",
            5 => "Reactive power QI",
            6 => "Reactive power QII",
            7 => "Reactive power QIII",
            8 => "Reactive power QIV",
            9 => "Apparent power+",
            10 => "Apparent power-",
            13 => "Power factor",
            14 => "Supply frequency",
            31 => "Current L1",
            32 => "Voltage L1",
            51 => "Current L2",
            52 => "Voltage L2",
            71 => "Current L3",
            72 => "Voltage L3",
            _ => return String::new(),
        };
        let processing = match self.d {
            4 => " current average",
            5 => " last average",
            6 => " maximum",
            7 => " instantaneous value",
            8 => " time integral 1",
            9 => " time integral 2",
            29 => " time integral 5",
            _ => "",
        };

        format!("{quantity}{processing}")
    }
}

impl Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}:{}.{}.{}*{}", self.a, self.b, self.c, self.d, self.e, self.f)
    }
}

impl Debug for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObisCode({})", self)
    }
}

/// Error returned when a dotted logical name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid logical name `{0}`, expected six dot separated numbers")]
pub struct ParseObisCodeError(pub String);

impl FromStr for ObisCode {
    type Err = ParseObisCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseObisCodeError(s.to_string()))?;

        Self::from_bytes(&parts).ok_or_else(|| ParseObisCodeError(s.to_string()))
    }
}

impl Serialize for ObisCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_dotted())
    }
}

impl<'de> Deserialize<'de> for ObisCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

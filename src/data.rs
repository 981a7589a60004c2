//! A-XDR encoded COSEM data values.
//!
//! Values read from a meter are untyped at the protocol boundary: a load profile row is just a
//! structure of whatever the device decided to capture. [`Data`] keeps the wire type tag, and the
//! `to_*` coercions convert on demand, returning a [`CoercionError`] instead of guessing.

use core::convert::TryFrom;
use core::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use derive_try_from_primitive::TryFromPrimitive;
use nom::{
    IResult,
    error::{Error, ErrorKind},
    number::complete::{be_f32, be_f64, be_i16, be_i32, be_i64, be_u16, be_u32, be_u64, i8, u8},
};

use crate::obis_code::ObisCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
#[rustfmt::skip]
pub enum DataType {
  Null               =  0,
  Array              =  1,
  Structure          =  2,
  Bool               =  3,
  BitString          =  4,
  DoubleLong         =  5,
  DoubleLongUnsigned =  6,
  OctetString        =  9,
  VisibleString      = 10,
  Utf8String         = 12,
  BinaryCodedDecimal = 13,
  Integer            = 15,
  Long               = 16,
  Unsigned           = 17,
  LongUnsigned       = 18,
  CompactArray       = 19,
  Long64             = 20,
  Long64Unsigned     = 21,
  Enum               = 22,
  Float32            = 23,
  Float64            = 24,
  DateTime           = 25,
  Date               = 26,
  Time               = 27,
}

/// Error raised when a value cannot be coerced to the requested type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("expected a numeric value, found {found}")]
    NotNumeric { found: String },
    #[error("expected a timestamp, found {found}")]
    NotTimestamp { found: String },
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("expected a logical name, found {found}")]
    NotObisCode { found: String },
    #[error("value {0} is out of range")]
    OutOfRange(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Date {
    pub(crate) year: u16,
    pub(crate) month: u8,
    pub(crate) day_of_month: u8,
    pub(crate) day_of_week: u8,
}

impl Date {
    pub fn new(year: u16, month: u8, day_of_month: u8, day_of_week: u8) -> Self {
        Self { year, month, day_of_month, day_of_week }
    }

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, year) = be_u16(input)?;
        let (input, month) = u8(input)?;
        let (input, day_of_month) = u8(input)?;
        let (input, day_of_week) = u8(input)?;

        Ok((input, Self { year, month, day_of_month, day_of_week }))
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.year.to_be_bytes());
        buf.push(self.month);
        buf.push(self.day_of_month);
        buf.push(self.day_of_week);
    }

    fn to_naive(&self) -> Result<NaiveDate, CoercionError> {
        // 0xFFFF year, 0xFD..=0xFF month and day are wildcards, not calendar values.
        if self.year == 0xFFFF || self.month >= 0xFD || self.day_of_month >= 0xFD {
            return Err(CoercionError::InvalidTimestamp(self.to_string()));
        }
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day_of_month))
            .ok_or_else(|| CoercionError::InvalidTimestamp(self.to_string()))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day_of_month)
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date(\"{}\")", self)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Time {
    pub(crate) hour: Option<u8>,
    pub(crate) minute: Option<u8>,
    pub(crate) second: Option<u8>,
    pub(crate) hundredth: Option<u8>,
}

impl Time {
    pub fn new(hour: Option<u8>, minute: Option<u8>, second: Option<u8>, hundredth: Option<u8>) -> Self {
        Self { hour, minute, second, hundredth }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, hour) = u8(input)?;
        let (input, minute) = u8(input)?;
        let (input, second) = u8(input)?;
        let (input, hundredth) = u8(input)?;

        let field = |value: u8, max: u8| -> Result<Option<u8>, nom::Err<Error<&[u8]>>> {
            match value {
                0xff => Ok(None),
                v if v <= max => Ok(Some(v)),
                _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Verify))),
            }
        };

        let hour = field(hour, 23)?;
        let minute = field(minute, 59)?;
        let second = field(second, 59)?;
        let hundredth = field(hundredth, 99)?;

        Ok((input, Self { hour, minute, second, hundredth }))
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.hour.unwrap_or(0xff));
        buf.push(self.minute.unwrap_or(0xff));
        buf.push(self.second.unwrap_or(0xff));
        buf.push(self.hundredth.unwrap_or(0xff));
    }

    fn to_naive(&self) -> Result<NaiveTime, CoercionError> {
        NaiveTime::from_hms_milli_opt(
            u32::from(self.hour.unwrap_or(0)),
            u32::from(self.minute.unwrap_or(0)),
            u32::from(self.second.unwrap_or(0)),
            u32::from(self.hundredth.unwrap_or(0)) * 10,
        )
        .ok_or_else(|| CoercionError::InvalidTimestamp(self.to_string()))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:02}",
            self.hour.unwrap_or(0),
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
            self.hundredth.unwrap_or(0),
        )
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time(\"{}\")", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStatus(pub(crate) u8);

impl ClockStatus {
    #[rustfmt::skip]
    const INVALID_VALUE_BIT:   u8 = 0b00000001;
    #[rustfmt::skip]
    const DOUBTFUL_VALUE_BIT:  u8 = 0b00000010;
    #[rustfmt::skip]
    const DAYLIGHT_SAVING_BIT: u8 = 0b10000000;

    pub fn invalid_value(&self) -> bool {
        (self.0 & Self::INVALID_VALUE_BIT) != 0
    }

    pub fn doubtful_value(&self) -> bool {
        (self.0 & Self::DOUBTFUL_VALUE_BIT) != 0
    }

    pub fn daylight_saving(&self) -> bool {
        (self.0 & Self::DAYLIGHT_SAVING_BIT) != 0
    }
}

/// A COSEM date-time (12 bytes on the wire).
#[derive(Clone, PartialEq, Eq)]
pub struct DateTime {
    pub(crate) date: Date,
    pub(crate) time: Time,
    pub(crate) offset_minutes: Option<i16>,
    pub(crate) clock_status: Option<ClockStatus>,
}

/// Encoded size of a COSEM date-time.
pub const DATE_TIME_LEN: usize = 12;

const OFFSET_NOT_SPECIFIED: i16 = 0x8000u16 as i16;

impl DateTime {
    pub fn new(date: Date, time: Time, offset_minutes: Option<i16>, clock_status: Option<u8>) -> Self {
        Self { date, time, offset_minutes, clock_status: clock_status.map(ClockStatus) }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, date) = Date::parse(input)?;
        let (input, time) = Time::parse(input)?;
        let (input, offset_minutes) = be_i16(input)?;
        let offset_minutes = Some(offset_minutes).filter(|&b| b != OFFSET_NOT_SPECIFIED);
        let (input, clock_status) = u8(input)?;
        let clock_status = Some(clock_status).filter(|&b| b != 0xff).map(ClockStatus);

        Ok((input, Self { date, time, offset_minutes, clock_status }))
    }

    /// Parses a date-time carried as a 12-byte octet string.
    pub fn from_octets(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != DATE_TIME_LEN {
            return None;
        }
        Self::parse(bytes).ok().map(|(_, date_time)| date_time)
    }

    /// Local wall-clock time with unspecified deviation and status.
    pub fn from_naive(value: NaiveDateTime) -> Self {
        let date = value.date();
        let time = value.time();
        Self {
            date: Date {
                year: date.year() as u16,
                month: date.month() as u8,
                day_of_month: date.day() as u8,
                day_of_week: date.weekday().number_from_monday() as u8,
            },
            time: Time {
                hour: Some(time.hour() as u8),
                minute: Some(time.minute() as u8),
                second: Some(time.second() as u8),
                hundredth: Some((time.nanosecond() / 10_000_000).min(99) as u8),
            },
            offset_minutes: None,
            clock_status: None,
        }
    }

    pub fn to_naive(&self) -> Result<NaiveDateTime, CoercionError> {
        Ok(NaiveDateTime::new(self.date.to_naive()?, self.time.to_naive()?))
    }

    pub fn clock_status(&self) -> Option<ClockStatus> {
        self.clock_status
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DATE_TIME_LEN);
        self.date.encode_into(&mut buf);
        self.time.encode_into(&mut buf);
        buf.extend_from_slice(&self.offset_minutes.unwrap_or(OFFSET_NOT_SPECIFIED).to_be_bytes());
        buf.push(self.clock_status.map(|s| s.0).unwrap_or(0xff));
        buf
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)?;

        if let Some(offset_minutes) = self.offset_minutes {
            // COSEM deviation is local time minus UTC, hence the inverted sign.
            let sign = if offset_minutes >= 0 { '-' } else { '+' };
            let offset_minutes = offset_minutes.unsigned_abs();
            write!(f, "{sign}{:02}:{:02}", offset_minutes / 60, offset_minutes % 60)?;
        }

        Ok(())
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime(\"{}\")", self)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Data {
    Null,
    Bool(bool),
    /// Bit string: number of bits and the packed bytes.
    BitString(usize, Vec<u8>),
    OctetString(Vec<u8>),
    VisibleString(String),
    Utf8String(String),
    Integer(i8),
    Unsigned(u8),
    Long(i16),
    LongUnsigned(u16),
    DoubleLong(i32),
    DoubleLongUnsigned(u32),
    Long64(i64),
    Long64Unsigned(u64),
    Float32(f32),
    Float64(f64),
    Enum(u8),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
    Array(Vec<Data>),
    Structure(Vec<Data>),
}

fn take_bytes(input: &[u8], count: usize) -> IResult<&[u8], &[u8]> {
    if input.len() < count {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Eof)));
    }
    Ok((&input[count..], &input[..count]))
}

/// Parses an A-XDR variable length (`0x00..=0x7f` or `0x8N` followed by N length bytes).
pub fn parse_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (input, first) = u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, usize::from(first)));
    }

    let count = usize::from(first & 0x7f);
    if count == 0 || count > 4 {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue)));
    }
    let (input, bytes) = take_bytes(input, count)?;
    let length = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    Ok((input, length))
}

/// Encodes an A-XDR variable length.
pub fn encode_length(length: usize, buf: &mut Vec<u8>) {
    if length < 0x80 {
        buf.push(length as u8);
    } else if length <= 0xff {
        buf.extend_from_slice(&[0x81, length as u8]);
    } else if length <= 0xffff {
        buf.push(0x82);
        buf.extend_from_slice(&(length as u16).to_be_bytes());
    } else {
        buf.push(0x84);
        buf.extend_from_slice(&(length as u32).to_be_bytes());
    }
}

/// Deepest array/structure nesting accepted from a meter.
pub const MAX_NESTING_DEPTH: usize = 32;

impl Data {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        Self::parse_nested(input, 0)
    }

    fn parse_nested(input: &[u8], depth: usize) -> IResult<&[u8], Self> {
        let (input, tag) = u8(input)?;
        let data_type = DataType::try_from(tag)
            .map_err(|_| nom::Err::Failure(Error::new(input, ErrorKind::Tag)))?;

        Ok(match data_type {
            DataType::Null => (input, Data::Null),
            DataType::Array | DataType::Structure => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
                }
                let (mut input, count) = parse_length(input)?;
                // Every element needs at least one byte, which bounds the allocation.
                let mut elements = Vec::with_capacity(count.min(input.len()));
                for _ in 0..count {
                    let (rest, element) = Self::parse_nested(input, depth + 1)?;
                    elements.push(element);
                    input = rest;
                }
                if data_type == DataType::Array {
                    (input, Data::Array(elements))
                } else {
                    (input, Data::Structure(elements))
                }
            }
            DataType::Bool => {
                let (input, b) = u8(input)?;
                (input, Data::Bool(b != 0))
            }
            DataType::BitString => {
                let (input, bits) = parse_length(input)?;
                let (input, bytes) = take_bytes(input, bits.div_ceil(8))?;
                (input, Data::BitString(bits, bytes.to_vec()))
            }
            DataType::OctetString => {
                let (input, len) = parse_length(input)?;
                let (input, bytes) = take_bytes(input, len)?;
                (input, Data::OctetString(bytes.to_vec()))
            }
            DataType::VisibleString | DataType::Utf8String => {
                let (input, len) = parse_length(input)?;
                let (input, bytes) = take_bytes(input, len)?;
                let text = String::from_utf8_lossy(bytes).into_owned();
                if data_type == DataType::VisibleString {
                    (input, Data::VisibleString(text))
                } else {
                    (input, Data::Utf8String(text))
                }
            }
            DataType::Integer => {
                let (input, n) = i8(input)?;
                (input, Data::Integer(n))
            }
            DataType::Unsigned => {
                let (input, n) = u8(input)?;
                (input, Data::Unsigned(n))
            }
            DataType::Long => {
                let (input, n) = be_i16(input)?;
                (input, Data::Long(n))
            }
            DataType::LongUnsigned => {
                let (input, n) = be_u16(input)?;
                (input, Data::LongUnsigned(n))
            }
            DataType::DoubleLong => {
                let (input, n) = be_i32(input)?;
                (input, Data::DoubleLong(n))
            }
            DataType::DoubleLongUnsigned => {
                let (input, n) = be_u32(input)?;
                (input, Data::DoubleLongUnsigned(n))
            }
            DataType::Long64 => {
                let (input, n) = be_i64(input)?;
                (input, Data::Long64(n))
            }
            DataType::Long64Unsigned => {
                let (input, n) = be_u64(input)?;
                (input, Data::Long64Unsigned(n))
            }
            DataType::Enum => {
                let (input, n) = u8(input)?;
                (input, Data::Enum(n))
            }
            DataType::Float32 => {
                let (input, n) = be_f32(input)?;
                (input, Data::Float32(n))
            }
            DataType::Float64 => {
                let (input, n) = be_f64(input)?;
                (input, Data::Float64(n))
            }
            DataType::DateTime => {
                let (input, date_time) = DateTime::parse(input)?;
                (input, Data::DateTime(date_time))
            }
            DataType::Date => {
                let (input, date) = Date::parse(input)?;
                (input, Data::Date(date))
            }
            DataType::Time => {
                let (input, time) = Time::parse(input)?;
                (input, Data::Time(time))
            }
            DataType::BinaryCodedDecimal | DataType::CompactArray => {
                return Err(nom::Err::Failure(Error::new(input, ErrorKind::NoneOf)));
            }
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Data::Null => DataType::Null,
            Data::Bool(_) => DataType::Bool,
            Data::BitString(..) => DataType::BitString,
            Data::OctetString(_) => DataType::OctetString,
            Data::VisibleString(_) => DataType::VisibleString,
            Data::Utf8String(_) => DataType::Utf8String,
            Data::Integer(_) => DataType::Integer,
            Data::Unsigned(_) => DataType::Unsigned,
            Data::Long(_) => DataType::Long,
            Data::LongUnsigned(_) => DataType::LongUnsigned,
            Data::DoubleLong(_) => DataType::DoubleLong,
            Data::DoubleLongUnsigned(_) => DataType::DoubleLongUnsigned,
            Data::Long64(_) => DataType::Long64,
            Data::Long64Unsigned(_) => DataType::Long64Unsigned,
            Data::Float32(_) => DataType::Float32,
            Data::Float64(_) => DataType::Float64,
            Data::Enum(_) => DataType::Enum,
            Data::DateTime(_) => DataType::DateTime,
            Data::Date(_) => DataType::Date,
            Data::Time(_) => DataType::Time,
            Data::Array(_) => DataType::Array,
            Data::Structure(_) => DataType::Structure,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.data_type() as u8);
        match self {
            Data::Null => {}
            Data::Bool(b) => buf.push(u8::from(*b)),
            Data::BitString(bits, bytes) => {
                encode_length(*bits, buf);
                buf.extend_from_slice(bytes);
            }
            Data::OctetString(bytes) => {
                encode_length(bytes.len(), buf);
                buf.extend_from_slice(bytes);
            }
            Data::VisibleString(text) | Data::Utf8String(text) => {
                encode_length(text.len(), buf);
                buf.extend_from_slice(text.as_bytes());
            }
            Data::Integer(n) => buf.push(*n as u8),
            Data::Unsigned(n) | Data::Enum(n) => buf.push(*n),
            Data::Long(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::LongUnsigned(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::DoubleLong(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::DoubleLongUnsigned(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::Long64(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::Long64Unsigned(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::Float32(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::Float64(n) => buf.extend_from_slice(&n.to_be_bytes()),
            Data::DateTime(date_time) => buf.extend_from_slice(&date_time.encode()),
            Data::Date(date) => date.encode_into(buf),
            Data::Time(time) => time.encode_into(buf),
            Data::Array(elements) | Data::Structure(elements) => {
                encode_length(elements.len(), buf);
                for element in elements {
                    element.encode_into(buf);
                }
            }
        }
    }

    /// Elements of an array or structure.
    pub fn elements(&self) -> Option<&[Data]> {
        match self {
            Data::Array(elements) | Data::Structure(elements) => Some(elements),
            _ => None,
        }
    }

    /// Numeric value of the data. `Null` reads as zero.
    pub fn to_f64(&self) -> Result<f64, CoercionError> {
        let value = match self {
            Data::Null => 0.0,
            Data::Bool(b) => f64::from(u8::from(*b)),
            Data::Integer(n) => f64::from(*n),
            Data::Unsigned(n) | Data::Enum(n) => f64::from(*n),
            Data::Long(n) => f64::from(*n),
            Data::LongUnsigned(n) => f64::from(*n),
            Data::DoubleLong(n) => f64::from(*n),
            Data::DoubleLongUnsigned(n) => f64::from(*n),
            Data::Long64(n) => *n as f64,
            Data::Long64Unsigned(n) => *n as f64,
            Data::Float32(n) => f64::from(*n),
            Data::Float64(n) => *n,
            Data::VisibleString(text) | Data::Utf8String(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| CoercionError::NotNumeric { found: format!("{text:?}") })?,
            other => return Err(CoercionError::NotNumeric { found: other.type_name() }),
        };
        Ok(value)
    }

    /// Non-negative integer value of the data.
    pub fn to_u64(&self) -> Result<u64, CoercionError> {
        match self {
            Data::Unsigned(n) | Data::Enum(n) => Ok(u64::from(*n)),
            Data::LongUnsigned(n) => Ok(u64::from(*n)),
            Data::DoubleLongUnsigned(n) => Ok(u64::from(*n)),
            Data::Long64Unsigned(n) => Ok(*n),
            Data::Integer(n) => u64::try_from(*n).map_err(|_| CoercionError::OutOfRange(n.to_string())),
            Data::Long(n) => u64::try_from(*n).map_err(|_| CoercionError::OutOfRange(n.to_string())),
            Data::DoubleLong(n) => {
                u64::try_from(*n).map_err(|_| CoercionError::OutOfRange(n.to_string()))
            }
            Data::Long64(n) => u64::try_from(*n).map_err(|_| CoercionError::OutOfRange(n.to_string())),
            other => Err(CoercionError::NotNumeric { found: other.type_name() }),
        }
    }

    /// Timestamp value of the data.
    ///
    /// Accepts date-times, dates (at midnight), 12-byte octet strings holding a COSEM date-time
    /// and textual `YYYY-MM-DD HH:MM:SS` values.
    pub fn to_date_time(&self) -> Result<NaiveDateTime, CoercionError> {
        match self {
            Data::DateTime(date_time) => date_time.to_naive(),
            Data::Date(date) => Ok(date.to_naive()?.and_time(NaiveTime::default())),
            Data::OctetString(bytes) => DateTime::from_octets(bytes)
                .ok_or_else(|| CoercionError::NotTimestamp { found: self.type_name() })?
                .to_naive(),
            Data::VisibleString(text) | Data::Utf8String(text) => {
                let text = text.trim();
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                    .map_err(|_| CoercionError::InvalidTimestamp(text.to_string()))
            }
            other => Err(CoercionError::NotTimestamp { found: other.type_name() }),
        }
    }

    pub fn to_obis_code(&self) -> Result<ObisCode, CoercionError> {
        match self {
            Data::OctetString(bytes) => ObisCode::from_bytes(bytes)
                .ok_or_else(|| CoercionError::NotObisCode { found: format!("{bytes:02x?}") }),
            other => Err(CoercionError::NotObisCode { found: other.type_name() }),
        }
    }

    fn type_name(&self) -> String {
        format!("{:?}", self.data_type())
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Null => write!(f, "null"),
            Data::Bool(b) => write!(f, "{b}"),
            Data::Integer(n) => write!(f, "{n}"),
            Data::Unsigned(n) | Data::Enum(n) => write!(f, "{n}"),
            Data::Long(n) => write!(f, "{n}"),
            Data::LongUnsigned(n) => write!(f, "{n}"),
            Data::DoubleLong(n) => write!(f, "{n}"),
            Data::DoubleLongUnsigned(n) => write!(f, "{n}"),
            Data::Long64(n) => write!(f, "{n}"),
            Data::Long64Unsigned(n) => write!(f, "{n}"),
            Data::Float32(n) => write!(f, "{n}"),
            Data::Float64(n) => write!(f, "{n}"),
            Data::VisibleString(text) | Data::Utf8String(text) => f.write_str(text),
            Data::DateTime(_) | Data::Date(_) | Data::OctetString(_) => match self.to_date_time() {
                Ok(timestamp) => write!(f, "{}", timestamp.format("%Y-%m-%d %H:%M:%S")),
                Err(_) => match self {
                    Data::DateTime(date_time) => write!(f, "{date_time}"),
                    Data::Date(date) => write!(f, "{date}"),
                    Data::OctetString(bytes) => {
                        bytes.iter().try_for_each(|b| write!(f, "{b:02X}"))
                    }
                    _ => Ok(()),
                },
            },
            Data::Time(time) => write!(f, "{time}"),
            Data::BitString(bits, _) => write!(f, "<{bits} bits>"),
            Data::Array(elements) | Data::Structure(elements) => {
                write!(f, "{{")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_time_bytes() -> [u8; 12] {
        [
            0x07, 0xE9, 0x01, 0x0F, 0x03, // 2025-01-15, Wednesday
            0x0C, 0x1E, 0x00, 0x00, // 12:30:00.00
            0x80, 0x00, // deviation not specified
            0xFF, // clock status not specified
        ]
    }

    #[test]
    fn test_data_type_try_from() {
        assert_eq!(DataType::try_from(0x01).unwrap(), DataType::Array);
        assert_eq!(DataType::try_from(0x19).unwrap(), DataType::DateTime);
        assert!(DataType::try_from(0x07).is_err());
        assert!(DataType::try_from(0xFF).is_err());
    }

    #[test]
    fn test_time_parse_invalid_hour() {
        assert!(Time::parse(&[0x18, 0x00, 0x00, 0x00]).is_err());
        assert!(Time::parse(&[0x0C, 0x3C, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_time_parse_wildcard() {
        let (_, time) = Time::parse(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(time, Time::new(None, None, None, None));
    }

    #[test]
    fn test_date_time_parse_and_display() {
        let bytes = date_time_bytes();
        let (remaining, dt) = DateTime::parse(&bytes).unwrap();

        assert!(remaining.is_empty());
        assert_eq!(dt.date.year, 2025);
        assert_eq!(dt.time.hour, Some(12));
        assert_eq!(dt.offset_minutes, None);
        assert_eq!(dt.clock_status, None);
        assert_eq!(dt.to_string(), "2025-01-15T12:30:00.00");
    }

    #[test]
    fn test_date_time_from_naive_encodes_weekday_and_wildcards() {
        let naive = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap().and_hms_opt(12, 30, 0).unwrap();
        let encoded = DateTime::from_naive(naive).encode();

        assert_eq!(encoded, date_time_bytes());
        assert_eq!(DateTime::from_octets(&encoded).unwrap().to_naive().unwrap(), naive);
    }

    #[test]
    fn test_clock_status_bits() {
        let status = ClockStatus(0b1000_0011);
        assert!(status.invalid_value());
        assert!(status.doubtful_value());
        assert!(status.daylight_saving());
        assert!(!ClockStatus(0).invalid_value());
    }

    #[test]
    fn test_parse_length_forms() {
        assert_eq!(parse_length(&[0x05]).unwrap(), (&[][..], 5));
        assert_eq!(parse_length(&[0x81, 0x80]).unwrap(), (&[][..], 128));
        assert_eq!(parse_length(&[0x82, 0x01, 0x2C, 0xAA]).unwrap(), (&[0xAA][..], 300));
        assert!(parse_length(&[0x80]).is_err());
        assert!(parse_length(&[0x82, 0x01]).is_err());
    }

    #[test]
    fn test_encode_length_forms() {
        let mut buf = Vec::new();
        encode_length(5, &mut buf);
        encode_length(200, &mut buf);
        encode_length(300, &mut buf);
        assert_eq!(buf, vec![0x05, 0x81, 0xC8, 0x82, 0x01, 0x2C]);
    }

    #[test]
    fn test_data_parse_scalars() {
        assert_eq!(Data::parse(&[0x00, 0xFF]).unwrap(), (&[0xFF][..], Data::Null));
        assert_eq!(Data::parse(&[0x03, 0x01]).unwrap().1, Data::Bool(true));
        assert_eq!(Data::parse(&[0x0f, 0xD6]).unwrap().1, Data::Integer(-42));
        assert_eq!(Data::parse(&[0x11, 0x2A]).unwrap().1, Data::Unsigned(42));
        assert_eq!(Data::parse(&[0x12, 0x1C, 0x30]).unwrap().1, Data::LongUnsigned(7216));
        assert_eq!(Data::parse(&[0x06, 0x00, 0x00, 0x01, 0x00]).unwrap().1, Data::DoubleLongUnsigned(256));
        assert_eq!(Data::parse(&[0x17, 0x42, 0x28, 0x00, 0x00]).unwrap().1, Data::Float32(42.0));
        assert_eq!(Data::parse(&[0x0a, 0x02, b'h', b'i']).unwrap().1, Data::VisibleString("hi".into()));
    }

    #[test]
    fn test_data_parse_nested_array_of_structures() {
        let input = [0x01, 0x02, 0x02, 0x01, 0x11, 0x01, 0x02, 0x01, 0x11, 0x02];
        let (remaining, data) = Data::parse(&input).unwrap();

        assert!(remaining.is_empty());
        assert_eq!(
            data,
            Data::Array(vec![
                Data::Structure(vec![Data::Unsigned(1)]),
                Data::Structure(vec![Data::Unsigned(2)]),
            ])
        );
    }

    #[test]
    fn test_data_parse_rejects_unknown_and_truncated() {
        assert!(Data::parse(&[0x07]).is_err());
        assert!(Data::parse(&[0x09, 0x04, 0xAA]).is_err());
        assert!(Data::parse(&[0x02, 0x02, 0x11, 0x01]).is_err());
        assert!(Data::parse(&[0x13, 0x00]).is_err());
    }

    #[test]
    fn test_data_encode_matches_parse() {
        let value = Data::Structure(vec![
            Data::LongUnsigned(8),
            Data::OctetString(vec![0, 0, 1, 0, 0, 255]),
            Data::Integer(2),
            Data::Array(vec![]),
            Data::DateTime(DateTime::parse(&date_time_bytes()).unwrap().1),
        ]);
        let encoded = value.encode();

        assert_eq!(&encoded[..4], &[0x02, 0x05, 0x12, 0x00]);
        assert_eq!(Data::parse(&encoded).unwrap(), (&[][..], value));
    }

    #[test]
    fn test_to_f64_coercions() {
        assert_eq!(Data::DoubleLongUnsigned(10).to_f64().unwrap(), 10.0);
        assert_eq!(Data::Long(-3).to_f64().unwrap(), -3.0);
        assert_eq!(Data::Float64(25.5).to_f64().unwrap(), 25.5);
        assert_eq!(Data::Null.to_f64().unwrap(), 0.0);
        assert_eq!(Data::Utf8String(" 12.5 ".into()).to_f64().unwrap(), 12.5);
        assert!(matches!(
            Data::OctetString(vec![1, 2]).to_f64(),
            Err(CoercionError::NotNumeric { .. })
        ));
        assert!(Data::VisibleString("abc".into()).to_f64().is_err());
    }

    #[test]
    fn test_to_u64_rejects_negative() {
        assert_eq!(Data::DoubleLongUnsigned(96).to_u64().unwrap(), 96);
        assert_eq!(Data::DoubleLong(5).to_u64().unwrap(), 5);
        assert!(matches!(Data::DoubleLong(-1).to_u64(), Err(CoercionError::OutOfRange(_))));
        assert!(Data::Float64(1.0).to_u64().is_err());
    }

    #[test]
    fn test_to_date_time_from_octet_string() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap().and_hms_opt(12, 30, 0).unwrap();

        assert_eq!(Data::OctetString(date_time_bytes().to_vec()).to_date_time().unwrap(), expected);
        assert!(Data::OctetString(vec![1, 2, 3]).to_date_time().is_err());
        assert!(Data::DoubleLong(5).to_date_time().is_err());
    }

    #[test]
    fn test_to_date_time_rejects_wildcard_date() {
        let mut bytes = date_time_bytes();
        bytes[0] = 0xFF;
        bytes[1] = 0xFF;
        let value = Data::OctetString(bytes.to_vec());

        assert!(matches!(value.to_date_time(), Err(CoercionError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_to_date_time_rejects_wildcard_month_and_day() {
        for (index, wildcard) in [(2, 0xFF), (2, 0xFD), (3, 0xFE), (3, 0xFF)] {
            let mut bytes = date_time_bytes();
            bytes[index] = wildcard;
            let value = Data::OctetString(bytes.to_vec());

            assert!(matches!(value.to_date_time(), Err(CoercionError::InvalidTimestamp(_))));
        }
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let mut input = [0x01, 0x01].repeat(30_000);
        input.push(0x00);

        assert!(matches!(Data::parse(&input), Err(nom::Err::Failure(_))));
    }

    #[test]
    fn test_parse_accepts_nesting_up_to_limit() {
        let mut input = [0x01, 0x01].repeat(MAX_NESTING_DEPTH);
        input.push(0x00);

        let (remaining, mut value) = Data::parse(&input).unwrap();
        assert!(remaining.is_empty());
        for _ in 0..MAX_NESTING_DEPTH {
            value = value.elements().unwrap()[0].clone();
        }
        assert_eq!(value, Data::Null);
    }

    #[test]
    fn test_to_date_time_from_text() {
        let value = Data::VisibleString("2025-01-15 01:00:00".into());
        assert_eq!(
            value.to_date_time().unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap().and_hms_opt(1, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_to_obis_code() {
        let value = Data::OctetString(vec![1, 0, 99, 1, 0, 255]);
        assert_eq!(value.to_obis_code().unwrap(), ObisCode::new(1, 0, 99, 1, 0, 255));
        assert!(Data::OctetString(vec![1, 0]).to_obis_code().is_err());
        assert!(Data::Unsigned(1).to_obis_code().is_err());
    }

    #[test]
    fn test_display_for_row_values() {
        assert_eq!(Data::Float64(25.5).to_string(), "25.5");
        assert_eq!(Data::DoubleLongUnsigned(10).to_string(), "10");
        assert_eq!(Data::OctetString(date_time_bytes().to_vec()).to_string(), "2025-01-15 12:30:00");
        assert_eq!(Data::OctetString(vec![0xAB, 0x01]).to_string(), "AB01");
        assert_eq!(Data::Structure(vec![Data::Unsigned(1), Data::Null]).to_string(), "{1, null}");
    }
}

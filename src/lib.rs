//! Daily load profile reader for DLMS/COSEM energy meters.
//!
//! A run opens an association with a meter, finds its load profile (a profile generic object),
//! reads the rows captured during the previous day and writes them as a one-line hourly report.
//!
//! The protocol side is a small synchronous client: A-XDR [`data`], logical name [`get`]
//! requests with block transfer and selective access, the ACSE [`association`] APDUs and
//! wrapper framed TCP [`transport`]. On top of it, [`extractor`] drives the run and [`report`]
//! formats the result.

pub mod association;
pub mod audit;
pub mod cache;
pub mod client;
pub mod config;
pub mod cosem;
pub mod data;
pub mod error;
pub mod extractor;
pub mod get;
pub mod obis_code;
pub mod report;
pub mod resolver;
pub mod session;
pub mod transport;

pub use client::{ClientError, ClientSettings, DlmsClient};
pub use config::ReaderConfig;
pub use data::Data;
pub use error::ReaderError;
pub use extractor::{Extraction, ProfileRangeExtractor};
pub use obis_code::ObisCode;
pub use session::{DlmsMeterSession, MeterSession};

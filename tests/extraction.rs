use std::fs;

use chrono::{NaiveDate, NaiveDateTime};
use load_profile_reader::cache::AssociationCache;
use load_profile_reader::config::{MediaConfig, ReportConfig};
use load_profile_reader::cosem::profile_generic::{ATTR_CAPTURE_OBJECTS, ATTR_ENTRIES_IN_USE, ATTR_PROFILE_ENTRIES};
use load_profile_reader::cosem::{AssociationView, CaptureObjectDefinition, LoadProfile, ObjectDescriptor, Row};
use load_profile_reader::data::DateTime;
use load_profile_reader::{ClientError, Data, MeterSession, ObisCode, ProfileRangeExtractor, ReaderConfig};

/// Meter exposing one load profile, known only by short name 25200.
#[derive(Debug)]
struct MockSession {
    view_reads: usize,
    closed: usize,
}

impl MockSession {
    fn new() -> Self {
        Self { view_reads: 0, closed: 0 }
    }
}

fn view() -> AssociationView {
    AssociationView::new(vec![
        ObjectDescriptor::new(8, 0, ObisCode::new(0, 0, 1, 0, 0, 255), Some(0x2BC0)),
        ObjectDescriptor::new(7, 1, ObisCode::new(1, 0, 99, 1, 0, 128), Some(25200)),
        ObjectDescriptor::new(3, 0, ObisCode::new(1, 0, 1, 29, 0, 255), Some(7216)),
        ObjectDescriptor::new(3, 0, ObisCode::new(1, 1, 3, 29, 1, 255), Some(7300)),
    ])
}

fn clock(hour: u32) -> Data {
    let at = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap().and_hms_opt(hour, 0, 0).unwrap();
    Data::OctetString(DateTime::from_naive(at).encode())
}

impl MeterSession for MockSession {
    fn read_association_view(&mut self) -> Result<AssociationView, ClientError> {
        self.view_reads += 1;
        Ok(view())
    }

    fn read_attribute(&mut self, object: &ObjectDescriptor, attribute_id: i8) -> Result<Data, ClientError> {
        assert_eq!(object.short_name, Some(25200));
        let capture = |class_id, logical_name| {
            CaptureObjectDefinition { class_id, logical_name, attribute_index: 2, data_index: 0 }.to_data()
        };
        match attribute_id {
            ATTR_CAPTURE_OBJECTS => Ok(Data::Array(vec![
                capture(8, ObisCode::new(0, 0, 1, 0, 0, 255)),
                capture(3, ObisCode::new(1, 0, 1, 29, 0, 255)),
                capture(3, ObisCode::new(1, 1, 3, 29, 1, 255)),
            ])),
            ATTR_ENTRIES_IN_USE => Ok(Data::DoubleLongUnsigned(2)),
            ATTR_PROFILE_ENTRIES => Ok(Data::DoubleLongUnsigned(1440)),
            _ => Err(ClientError::ConnectionClosed),
        }
    }

    fn read_rows_by_range(
        &mut self,
        _profile: &LoadProfile,
        _from: NaiveDateTime,
        _to: NaiveDateTime,
    ) -> Result<Vec<Row>, ClientError> {
        Ok(vec![
            Row(vec![clock(1), Data::DoubleLongUnsigned(10), Data::DoubleLongUnsigned(5)]),
            Row(vec![clock(2), Data::Float64(25.5), Data::DoubleLongUnsigned(1)]),
        ])
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.closed += 1;
        Ok(())
    }
}

fn config(dir: &std::path::Path) -> ReaderConfig {
    ReaderConfig {
        media: MediaConfig::Tcp { host: "10.1.2.3".into(), port: 4059 },
        cache_dir: dir.to_path_buf(),
        report: ReportConfig { directory: dir.join("Readings"), ..ReportConfig::default() },
        ..ReaderConfig::default()
    }
}

#[test]
fn test_extracts_previous_day_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut session = MockSession::new();
    let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();

    let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today).unwrap();
    session.close().unwrap();

    assert_eq!(extraction.profile.descriptor.short_name, Some(25200));
    assert_eq!(extraction.columns.primary, 1);
    assert_eq!(extraction.columns.secondary, 2);

    let report = extraction.report.unwrap();
    assert_eq!(report.slot(0), "1");
    assert_eq!(report.slot(1), "2.6");
    assert!((2..24).all(|slot| report.slot(slot) == "0"));

    let written = fs::read_to_string(extraction.report_path.unwrap()).unwrap();
    assert_eq!(written, report.render());
    assert_eq!(written.split(';').count(), 27);
    assert_eq!(session.closed, 1);
}

#[test]
fn test_corrupt_cache_falls_back_to_device() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let cache = AssociationCache::for_media(dir.path(), "10.1.2.3", 4059);
    fs::write(cache.path(), "<GXDLMSObjectCollection>").unwrap();

    let mut session = MockSession::new();
    let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today).unwrap();

    assert_eq!(session.view_reads, 1);
    assert!(extraction.report.is_some());
    assert_eq!(cache.load().unwrap(), Some(view()));
}

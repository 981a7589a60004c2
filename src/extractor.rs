//! The extraction run: find the load profile, resolve its columns, read yesterday's rows and
//! write the daily report.
//!
//! Failures are handled at the step that raises them. Only a missing association view or a
//! missing profile stop the run; a failed column or entries read is logged and the run goes on,
//! and a failed row read or a value that cannot be formatted abandons the report.

use std::path::PathBuf;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{error, info, warn};

use crate::cache::AssociationCache;
use crate::config::{MediaConfig, ReaderConfig};
use crate::cosem::profile_generic::{ATTR_CAPTURE_OBJECTS, ATTR_ENTRIES_IN_USE, ATTR_PROFILE_ENTRIES};
use crate::cosem::{AssociationView, CaptureObjectDefinition, LoadProfile, Row};
use crate::error::ReaderError;
use crate::report::{ReportAssembler, ReportLine, render_row_table, report_path, write_report};
use crate::resolver::{ColumnResolver, ResolvedColumns};
use crate::session::MeterSession;

/// `[yesterday 01:00, today 00:00)`
pub fn previous_day_window(today: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let yesterday = today - Days::new(1);
    let one_am = NaiveTime::from_hms_opt(1, 0, 0).unwrap_or_default();
    (yesterday.and_time(one_am), today.and_time(NaiveTime::default()))
}

/// What a run produced. Steps that failed without stopping the run are listed in `skipped`.
#[derive(Debug)]
pub struct Extraction {
    pub profile: LoadProfile,
    pub columns: ResolvedColumns,
    pub rows: Vec<Row>,
    pub report: Option<ReportLine>,
    pub report_path: Option<PathBuf>,
    pub skipped: Vec<ReaderError>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileRangeExtractor<'a> {
    config: &'a ReaderConfig,
}

impl<'a> ProfileRangeExtractor<'a> {
    pub fn new(config: &'a ReaderConfig) -> Self {
        Self { config }
    }

    fn cache(&self) -> AssociationCache {
        match &self.config.media {
            MediaConfig::Tcp { host, port } => AssociationCache::for_media(&self.config.cache_dir, host, *port),
            MediaConfig::Serial { port_name, .. } => AssociationCache::for_serial(&self.config.cache_dir, port_name),
        }
    }

    /// Runs the extraction for the day before `today`. The session is left open.
    pub fn run<S: MeterSession>(&self, session: &mut S, today: NaiveDate) -> Result<Extraction, ReaderError> {
        let view = self.cache().load_or_fetch(|| session.read_association_view()).map_err(ReaderError::Transport)?;
        let extraction = self.extract(session, &view, today)?;
        info!("Finish reading meter");
        Ok(extraction)
    }

    fn extract<S: MeterSession>(
        &self,
        session: &mut S,
        view: &AssociationView,
        today: NaiveDate,
    ) -> Result<Extraction, ReaderError> {
        let target = &self.config.profile;
        let descriptor = view.find_profile(target).ok_or(ReaderError::ProfileNotFound {
            logical_name: target.logical_name,
            short_name: target.short_name,
        })?;

        let mut extraction = Extraction {
            profile: LoadProfile::new(descriptor.clone()),
            columns: ResolvedColumns { primary: 0, secondary: 0, primary_matched: false, secondary_matched: false },
            rows: Vec::new(),
            report: None,
            report_path: None,
            skipped: Vec::new(),
        };
        let name = descriptor.name();
        info!("{name}");

        match read_capture_objects(session, &extraction.profile) {
            Ok(definitions) => {
                extraction.profile.set_capture_objects(definitions, view);
                self.resolve_columns(&mut extraction);
            }
            Err(e) => {
                error!("Failed to read columns: {e}");
                extraction.skipped.push(e);
            }
        }

        info!("Reading ProfileGeneric {name} {}", descriptor.description);
        self.read_entries(session, &mut extraction);
        info!("Entries: {}/{}", extraction.profile.entries_in_use, extraction.profile.profile_entries);
        if extraction.profile.entries_in_use == 0 || extraction.profile.columns.is_empty() {
            warn!("Profile Generic {name} reports no entries or no columns");
        }

        let (from, to) = previous_day_window(today);
        extraction.rows = match session.read_rows_by_range(&extraction.profile, from, to) {
            Ok(rows) => rows,
            Err(e) => {
                let e = ReaderError::Communication(e);
                error!("Failed to read last day: {e}");
                extraction.skipped.push(e);
                return Ok(extraction);
            }
        };

        match self.assemble(&extraction, from) {
            Ok(line) => {
                let path = report_path(
                    &self.config.report.directory,
                    today,
                    &self.config.report.border_code,
                    &self.config.report.backup_flag,
                );
                match write_report(&path, &line) {
                    Ok(()) => {
                        info!("Report written to {}", path.display());
                        extraction.report_path = Some(path);
                    }
                    Err(e) => {
                        let e = ReaderError::Io(e);
                        error!("Failed to write report {}: {e}", path.display());
                        extraction.skipped.push(e);
                    }
                }
                extraction.report = Some(line);
            }
            Err(e) => {
                error!("Failed to read last day: {e}");
                extraction.skipped.push(e);
            }
        }

        Ok(extraction)
    }

    fn resolve_columns(&self, extraction: &mut Extraction) {
        let profile = &extraction.profile;
        let resolver = ColumnResolver::new(self.config.primary, self.config.secondary, self.config.resolution);
        extraction.columns = resolver.resolve(&profile.columns, (0, 0));

        info!("Profile Generic {} Columns:", profile.descriptor.name());
        let listing: Vec<String> =
            profile.columns.iter().map(|column| format!("{} {}", column.name(), column.description)).collect();
        info!("{}", listing.join(" | "));

        if !extraction.columns.primary_matched {
            warn!("no column matches {}, reading column 0", self.config.primary.logical_name);
        }
        if !extraction.columns.secondary_matched {
            warn!("no column matches {}, reading column 0", self.config.secondary.logical_name);
        }
    }

    fn read_entries<S: MeterSession>(&self, session: &mut S, extraction: &mut Extraction) {
        let descriptor = extraction.profile.descriptor.clone();
        let counts = session
            .read_attribute(&descriptor, ATTR_ENTRIES_IN_USE)
            .and_then(|in_use| Ok((in_use, session.read_attribute(&descriptor, ATTR_PROFILE_ENTRIES)?)))
            .map_err(ReaderError::Communication)
            .and_then(|(in_use, capacity)| Ok((in_use.to_u64()?, capacity.to_u64()?)));

        match counts {
            Ok((in_use, capacity)) => {
                extraction.profile.entries_in_use = in_use;
                extraction.profile.profile_entries = capacity;
            }
            Err(e) => {
                error!("Failed to read entries: {e}");
                extraction.skipped.push(e);
            }
        }
    }

    /// Logs the row table, then builds the report line.
    fn assemble(&self, extraction: &Extraction, window_start: NaiveDateTime) -> Result<ReportLine, ReaderError> {
        let columns = extraction.columns;
        let table = render_row_table(&extraction.rows, columns.primary, columns.secondary)?;
        info!("\n{}", table.join("\n"));

        let assembler = ReportAssembler {
            border_code: self.config.report.border_code.clone(),
            backup_flag: self.config.report.backup_flag.clone(),
            factor: self.config.report.factor,
            slot_policy: self.config.report.slot_policy,
            total_policy: self.config.report.total_policy,
            window_start,
        };
        Ok(assembler.assemble(&extraction.rows, columns.primary)?)
    }
}

fn read_capture_objects<S: MeterSession>(
    session: &mut S,
    profile: &LoadProfile,
) -> Result<Vec<CaptureObjectDefinition>, ReaderError> {
    let value = session.read_attribute(&profile.descriptor, ATTR_CAPTURE_OBJECTS).map_err(ReaderError::Communication)?;
    CaptureObjectDefinition::parse_list(&value)
        .map_err(|e| ReaderError::Communication(crate::client::ClientError::InvalidResponseData(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::cosem::ObjectDescriptor;
    use crate::data::{Data, DateTime};
    use crate::obis_code::ObisCode;
    use std::collections::HashMap;

    const PROFILE: ObisCode = ObisCode::new(1, 0, 99, 1, 0, 255);

    #[derive(Debug, Default)]
    struct MockSession {
        view: AssociationView,
        attributes: HashMap<i8, Data>,
        rows: Option<Vec<Row>>,
        view_reads: usize,
        ranges: Vec<(NaiveDateTime, NaiveDateTime)>,
    }

    impl MeterSession for MockSession {
        fn read_association_view(&mut self) -> Result<AssociationView, ClientError> {
            self.view_reads += 1;
            Ok(self.view.clone())
        }

        fn read_attribute(&mut self, _object: &ObjectDescriptor, attribute_id: i8) -> Result<Data, ClientError> {
            self.attributes.get(&attribute_id).cloned().ok_or(ClientError::ConnectionClosed)
        }

        fn read_rows_by_range(
            &mut self,
            _profile: &LoadProfile,
            from: NaiveDateTime,
            to: NaiveDateTime,
        ) -> Result<Vec<Row>, ClientError> {
            self.ranges.push((from, to));
            self.rows.clone().ok_or(ClientError::ConnectionClosed)
        }

        fn close(&mut self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn capture(class_id: u16, logical_name: ObisCode) -> Data {
        CaptureObjectDefinition { class_id, logical_name, attribute_index: 2, data_index: 0 }.to_data()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn row(hour: u32, p: Data, q: Data) -> Row {
        let clock = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap().and_hms_opt(hour, 0, 0).unwrap();
        Row(vec![Data::OctetString(DateTime::from_naive(clock).encode()), p, q])
    }

    fn session() -> MockSession {
        let mut attributes = HashMap::new();
        attributes.insert(
            ATTR_CAPTURE_OBJECTS,
            Data::Array(vec![
                capture(8, ObisCode::new(0, 0, 1, 0, 0, 255)),
                capture(3, ObisCode::new(1, 1, 1, 29, 1, 255)),
                capture(3, ObisCode::new(1, 1, 3, 29, 1, 255)),
            ]),
        );
        attributes.insert(ATTR_ENTRIES_IN_USE, Data::DoubleLongUnsigned(2));
        attributes.insert(ATTR_PROFILE_ENTRIES, Data::DoubleLongUnsigned(960));

        MockSession {
            view: AssociationView::new(vec![ObjectDescriptor::new(7, 1, PROFILE, None)]),
            attributes,
            rows: Some(vec![
                row(1, Data::DoubleLongUnsigned(10), Data::DoubleLongUnsigned(5)),
                row(2, Data::Float64(25.5), Data::DoubleLongUnsigned(1)),
            ]),
            ..MockSession::default()
        }
    }

    fn config(dir: &std::path::Path) -> ReaderConfig {
        ReaderConfig {
            cache_dir: dir.join("cache"),
            report: crate::config::ReportConfig { directory: dir.join("Readings"), ..Default::default() },
            ..ReaderConfig::default()
        }
    }

    #[test]
    fn test_previous_day_window() {
        let (from, to) = previous_day_window(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap().and_hms_opt(1, 0, 0).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = session();

        let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap();

        assert!(extraction.skipped.is_empty());
        assert_eq!((extraction.columns.primary, extraction.columns.secondary), (1, 2));
        assert_eq!(extraction.profile.entries_in_use, 2);
        assert_eq!(extraction.profile.profile_entries, 960);
        assert_eq!(session.ranges, vec![previous_day_window(today())]);

        let path = extraction.report_path.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Frt0000;P;0;1;2.6;0;"));
        assert!(path.ends_with("2025/01/2025-01-15 - Frt0000P.txt"));
    }

    #[test]
    fn test_run_caches_association_view() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = session();
        let extractor = ProfileRangeExtractor::new(&config);

        extractor.run(&mut session, today()).unwrap();
        extractor.run(&mut session, today()).unwrap();

        assert_eq!(session.view_reads, 1);
    }

    #[test]
    fn test_serial_cache_is_named_after_the_port() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReaderConfig {
            media: MediaConfig::Serial { port_name: "COM3".into(), iec: false },
            ..config(dir.path())
        };
        let mut session = session();

        ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap();

        assert!(dir.path().join("cache").join("COM3.json").exists());
        assert!(!dir.path().join("cache").join("COM3_0.json").exists());
    }

    #[test]
    fn test_missing_profile_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = MockSession { view: AssociationView::new(vec![]), ..session() };

        let error = ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap_err();

        assert!(matches!(error, ReaderError::ProfileNotFound { .. }));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_column_read_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = session();
        session.attributes.remove(&ATTR_CAPTURE_OBJECTS);

        let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap();

        assert!(matches!(extraction.skipped[0], ReaderError::Communication(_)));
        assert!(extraction.profile.columns.is_empty());
        assert_eq!(extraction.profile.entries_in_use, 2);
        // column 0 holds the clock, which is not numeric
        assert!(extraction.report.is_none());
    }

    #[test]
    fn test_entries_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = session();
        session.attributes.remove(&ATTR_PROFILE_ENTRIES);

        let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap();

        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.profile.entries_in_use, 0);
        assert!(extraction.report.is_some());
    }

    #[test]
    fn test_row_read_failure_skips_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = MockSession { rows: None, ..session() };

        let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap();

        assert!(matches!(extraction.skipped.as_slice(), [ReaderError::Communication(_)]));
        assert!(extraction.report.is_none());
        assert!(extraction.report_path.is_none());
    }

    #[test]
    fn test_format_error_abandons_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut session = MockSession {
            rows: Some(vec![row(1, Data::VisibleString("n/a".into()), Data::Unsigned(0))]),
            ..session()
        };

        let extraction = ProfileRangeExtractor::new(&config).run(&mut session, today()).unwrap();

        assert!(matches!(extraction.skipped.as_slice(), [ReaderError::Format(_)]));
        assert!(extraction.report.is_none());
        assert!(!dir.path().join("Readings").exists());
    }
}

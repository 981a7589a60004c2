//! Daily report assembly.
//!
//! A report is a single line:
//!
//! ```text
//! <border code>;<backup flag>;<total>;<slot 0>;<slot 1>;...;<slot 23>
//! ```
//!
//! Each slot holds the primary quantity of one row, scaled by a constant factor and rendered with
//! at most one decimal.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::cosem::Row;
use crate::data::CoercionError;

pub const SLOT_COUNT: usize = 24;

pub const ROW_TABLE_HEADER: &str = "    Clock    |  P  |  Q  |";

/// How a row is assigned to an hour slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotPolicy {
    /// The n-th row returned by the meter fills slot n.
    #[default]
    PositionIndexed,
    /// Slot n holds the row captured n whole hours after the start of the window.
    TimestampDerived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TotalPolicy {
    /// The total field is always `0`.
    #[default]
    Zero,
    /// Sum of the scaled primary values of the written slots.
    SumPrimary,
}

/// Formats a scaled value with at most one decimal, rounding half away from zero.
///
/// Whole numbers have no decimal point and zero renders as `0`.
pub fn format_scaled(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        "0".to_string()
    } else if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub border_code: String,
    pub backup_flag: String,
    pub total: f64,
    /// Scaled primary values; `None` for slots no row landed in.
    pub slots: [Option<f64>; SLOT_COUNT],
}

impl ReportLine {
    pub fn slot(&self, index: usize) -> String {
        self.slots.get(index).copied().flatten().map_or_else(|| "0".to_string(), format_scaled)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.border_code, self.backup_flag, format_scaled(self.total))?;
        for index in 0..SLOT_COUNT {
            write!(f, ";{}", self.slot(index))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReportAssembler {
    pub border_code: String,
    pub backup_flag: String,
    pub factor: f64,
    pub slot_policy: SlotPolicy,
    pub total_policy: TotalPolicy,
    /// Start of the read window; slot 0 under [`SlotPolicy::TimestampDerived`].
    pub window_start: NaiveDateTime,
}

impl ReportAssembler {
    /// Builds the report line from `rows`, reading the primary quantity at `primary_index`.
    ///
    /// Fails on the first row whose primary value is not numeric.
    pub fn assemble(&self, rows: &[Row], primary_index: usize) -> Result<ReportLine, CoercionError> {
        let mut slots = [None; SLOT_COUNT];

        for (position, row) in rows.iter().enumerate() {
            let Some(slot) = self.slot_of(position, row)? else {
                continue;
            };
            let scaled = numeric_at(row, primary_index)? * self.factor;
            if !scaled.is_finite() {
                return Err(CoercionError::OutOfRange(scaled.to_string()));
            }
            slots[slot] = Some(scaled);
        }

        let total = match self.total_policy {
            TotalPolicy::Zero => 0.0,
            TotalPolicy::SumPrimary => slots.iter().flatten().sum::<f64>(),
        };

        Ok(ReportLine {
            border_code: self.border_code.clone(),
            backup_flag: self.backup_flag.clone(),
            total,
            slots,
        })
    }

    fn slot_of(&self, position: usize, row: &Row) -> Result<Option<usize>, CoercionError> {
        match self.slot_policy {
            SlotPolicy::PositionIndexed => Ok((position < SLOT_COUNT).then_some(position)),
            SlotPolicy::TimestampDerived => {
                let minutes = (row.timestamp()? - self.window_start).num_minutes();
                if minutes < 0 {
                    return Ok(None);
                }
                let hour = (minutes / 60) as usize;
                Ok((hour < SLOT_COUNT).then_some(hour))
            }
        }
    }
}

fn numeric_at(row: &Row, index: usize) -> Result<f64, CoercionError> {
    row.value(index)
        .ok_or_else(|| CoercionError::NotNumeric { found: format!("no value at column {index}") })?
        .to_f64()
}

/// Renders the rows as the table written to the run log, header first.
pub fn render_row_table(rows: &[Row], primary: usize, secondary: usize) -> Result<Vec<String>, CoercionError> {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(ROW_TABLE_HEADER.to_string());

    for row in rows {
        let clock = row.timestamp()?;
        lines.push(format!(
            "{} | {} | {} |",
            clock.format("%Y-%m-%d %H:%M:%S"),
            numeric_at(row, primary)?,
            numeric_at(row, secondary)?,
        ));
    }

    Ok(lines)
}

/// `<dir>/<yyyy>/<MM>/<yyyy-MM-dd> - <border code><backup flag>.txt`
pub fn report_path(dir: impl AsRef<Path>, date: NaiveDate, border_code: &str, backup_flag: &str) -> PathBuf {
    dir.as_ref()
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(format!("{} - {border_code}{backup_flag}.txt", date.format("%Y-%m-%d")))
}

/// Writes the report, replacing any previous report at `path`.
pub fn write_report(path: &Path, line: &ReportLine) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, line.render())
}

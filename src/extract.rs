//! Activity export readers.
//!
//! Both readers yield the same [`RawActivityRecord`] shape. A row without a `Day`
//! value is not a record: it comes back as a [`RowReject`] so the caller can log it.
//! Any `Err` means the whole file is unusable.

use crate::date::DayValue;
use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use log::{info, warn};
use std::fmt;
use std::fs;
use std::path::Path;

pub const DEFAULT_DURATION: &str = "00:00:00";
pub const DEFAULT_PROJECT: &str = "Unknown";

/// One activity row as exported, before normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct RawActivityRecord {
    pub duration: String,
    pub project: String,
    pub title: String,
    pub day: DayValue,
}

impl fmt::Display for RawActivityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Duration={}; Project={}; Title={}; Day={}",
            self.duration, self.project, self.title, self.day
        )
    }
}

/// A row dropped during extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowReject {
    pub context: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    pub records: Vec<RawActivityRecord>,
    pub rejects: Vec<RowReject>,
}

pub trait RecordReader {
    fn extract(&self, path: &Path) -> Result<Extraction>;
}

/// Input file flavor, chosen by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Delimited,
    Spreadsheet,
}

impl FileKind {
    /// `.csv` or `.xlsx`, case-insensitive.
    pub fn from_name(name: &str) -> Option<FileKind> {
        let lower = name.to_lowercase();
        if lower.ends_with(".csv") {
            Some(FileKind::Delimited)
        } else if lower.ends_with(".xlsx") {
            Some(FileKind::Spreadsheet)
        } else {
            None
        }
    }

    pub fn reader(self) -> Box<dyn RecordReader> {
        match self {
            FileKind::Delimited => Box::new(DelimitedReader),
            FileKind::Spreadsheet => Box::new(SpreadsheetReader),
        }
    }
}

/// Header positions of the columns we read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Columns {
    day: Option<usize>,
    duration: Option<usize>,
    project: Option<usize>,
    title: Option<usize>,
}

impl Columns {
    fn from_headers<I, S>(headers: I) -> Columns
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut c = Columns::default();
        for (i, h) in headers.into_iter().enumerate() {
            let slot = match h.as_ref().trim() {
                "Day" => &mut c.day,
                "Duration" => &mut c.duration,
                "Project" => &mut c.project,
                "Title" => &mut c.title,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(i);
            }
        }
        c
    }
}

/// CSV or TSV with a header row; encoding is detected per file.
pub struct DelimitedReader;

impl RecordReader for DelimitedReader {
    fn extract(&self, path: &Path) -> Result<Extraction> {
        let bytes = fs::read(path)?;
        let text = decode(&bytes, &path.display().to_string());
        parse_delimited(&text, &path.display().to_string())
    }
}

/// Decodes raw bytes: BOM first, otherwise the detector's guess. Bad sequences become U+FFFD.
pub fn decode(bytes: &[u8], source: &str) -> String {
    let encoding = match Encoding::for_bom(bytes) {
        Some((enc, _)) => enc,
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        }
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    info!("decoding {} as {}", source, used.name());
    if had_errors {
        warn!("{}: invalid {} sequences replaced", source, used.name());
    }
    text.into_owned()
}

/// Tab-delimited if the first line has a tab, comma otherwise.
pub fn detect_delimiter(text: &str) -> u8 {
    match text.lines().next() {
        Some(first) if first.contains('\t') => b'\t',
        _ => b',',
    }
}

pub fn parse_delimited(text: &str, source: &str) -> Result<Extraction> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    info!("columns in {}: {:?}", source, headers.iter().collect::<Vec<_>>());
    let cols = Columns::from_headers(headers.iter());

    let mut out = Extraction::default();
    for (idx, row) in rdr.records().enumerate() {
        let row = row?;
        let field = |c: Option<usize>| c.and_then(|i| row.get(i));
        let Some(day) = field(cols.day) else {
            out.rejects.push(RowReject {
                context: format!("{} row {}: {:?}", source, idx, row.iter().collect::<Vec<_>>()),
                message: "skipping row without a 'Day' column".to_string(),
            });
            continue;
        };
        out.records.push(RawActivityRecord {
            duration: field(cols.duration).unwrap_or(DEFAULT_DURATION).to_string(),
            project: field(cols.project).unwrap_or(DEFAULT_PROJECT).to_string(),
            title: field(cols.title).unwrap_or("").to_string(),
            day: DayValue::Text(day.to_string()),
        });
    }
    Ok(out)
}

/// First worksheet of an `.xlsx` workbook; first row is the header.
pub struct SpreadsheetReader;

impl RecordReader for SpreadsheetReader {
    fn extract(&self, path: &Path) -> Result<Extraction> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Spreadsheet(format!("{} has no worksheets", path.display())))??;
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Extraction::default());
        };
        let header: Vec<String> = header.iter().map(|c| c.to_string()).collect();
        info!("columns in {}: {:?}", path.display(), header);
        let cols = Columns::from_headers(&header);
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut out = Extraction::default();
        for (idx, row) in rows.enumerate() {
            match record_from_cells(&cols, row) {
                Some(record) => out.records.push(record),
                None => out.rejects.push(RowReject {
                    context: format!("{} row {}", source, idx),
                    message: format!("skipping row {} without a 'Day' value", idx),
                }),
            }
        }
        Ok(out)
    }
}

fn record_from_cells(cols: &Columns, row: &[Data]) -> Option<RawActivityRecord> {
    let cell = |c: Option<usize>| c.and_then(|i| row.get(i));
    let day = cell(cols.day).and_then(day_value)?;
    Some(RawActivityRecord {
        duration: cell(cols.duration)
            .and_then(duration_text)
            .unwrap_or_else(|| DEFAULT_DURATION.to_string()),
        project: cell(cols.project)
            .and_then(cell_text)
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
        title: cell(cols.title).and_then(cell_text).unwrap_or_default(),
        day,
    })
}

/// `None` for empty, blank and error cells.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::DateTimeIso(s) => Some(s.replace('T', " ")),
        other => Some(other.to_string()),
    }
}

fn day_value(cell: &Data) -> Option<DayValue> {
    match cell {
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(ndt) => DayValue::DateTime(ndt),
            None => DayValue::Text(cell.to_string()),
        }),
        other => cell_text(other).map(DayValue::Text),
    }
}

/// Time-formatted cells are fractions of a day; render them as `H:MM:SS`.
fn duration_text(cell: &Data) -> Option<String> {
    match cell {
        Data::DateTime(dt) => Some(hms_from_days(dt.as_f64())),
        other => cell_text(other),
    }
}

fn hms_from_days(days: f64) -> String {
    let total = (days * 86400.0).round().max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}

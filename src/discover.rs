//! Finds `All Activities <YYYY-MM-DD>.csv|.xlsx` exports in a directory, oldest first.

use crate::error::{Error, Result};
use crate::extract::FileKind;
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File-name prefix of the time tracker's daily export.
pub const FILE_PREFIX: &str = "All Activities";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub name: String,
    pub kind: FileKind,
    /// Date from the name, or [`undated`] when the suffix does not parse.
    pub date: NaiveDate,
}

/// Sort key for files whose name carries no usable date; orders them first.
pub fn undated() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^all activities(.*)\.(csv|xlsx)$").expect("file name pattern is valid")
    })
}

/// Returns the file kind and the text between the prefix and the extension, or `None` if `name` is not an export.
pub fn match_name(name: &str) -> Option<(FileKind, String)> {
    let caps = name_pattern().captures(name)?;
    let kind = FileKind::from_name(name)?;
    Some((kind, caps[1].trim().to_string()))
}

/// Date embedded in an export's file name; [`undated`] if absent or malformed.
pub fn date_from_name(name: &str) -> NaiveDate {
    match_name(name)
        .and_then(|(_, suffix)| NaiveDate::parse_from_str(&suffix, "%Y-%m-%d").ok())
        .unwrap_or_else(undated)
}

/// Lists exports in `dir`, ordered by embedded date then name.
pub fn discover(dir: &Path) -> Result<Vec<InputFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if let Some((kind, _)) = match_name(&name) {
            files.push(InputFile {
                date: date_from_name(&name),
                path,
                name,
                kind,
            });
        }
    }
    files.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

/// Like [`discover`], but an empty result is an error.
pub fn discover_required(dir: &Path) -> Result<Vec<InputFile>> {
    let files = discover(dir)?;
    if files.is_empty() {
        return Err(Error::NoInputFiles(dir.display().to_string()));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "Day\n").unwrap();
    }

    #[test]
    fn test_match_name() {
        assert_eq!(
            match_name("All Activities 2025-02-20.csv"),
            Some((FileKind::Delimited, "2025-02-20".to_string()))
        );
        assert_eq!(
            match_name("all activities 2025-02-20.XLSX"),
            Some((FileKind::Spreadsheet, "2025-02-20".to_string()))
        );
        assert!(match_name("Activities 2025-02-20.csv").is_none());
        assert!(match_name("All Activities 2025-02-20.txt").is_none());
        assert!(match_name("All Activities 2025-02-20.csv.bak").is_none());
    }

    #[test]
    fn test_date_from_name() {
        assert_eq!(
            date_from_name("All Activities 2025-02-20.xlsx"),
            NaiveDate::from_ymd_opt(2025, 2, 20).unwrap()
        );
        assert_eq!(date_from_name("All Activities.csv"), undated());
        assert_eq!(date_from_name("All Activities (copy).csv"), undated());
        assert_eq!(date_from_name("All Activities 2025-13-01.csv"), undated());
    }

    #[test]
    fn test_discover_sorts_by_embedded_date() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "All Activities 2025-03-01.csv");
        touch(dir.path(), "All Activities 2025-02-28.xlsx");
        touch(dir.path(), "all activities 2024-12-31.csv");
        touch(dir.path(), "All Activities broken.csv");
        touch(dir.path(), "notes.csv");
        fs::create_dir(dir.path().join("All Activities 2025-01-01.csv")).unwrap();
        let files = discover(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "All Activities broken.csv",
                "all activities 2024-12-31.csv",
                "All Activities 2025-02-28.xlsx",
                "All Activities 2025-03-01.csv",
            ]
        );
        assert_eq!(files[2].kind, FileKind::Spreadsheet);
        assert_eq!(files[0].date, undated());
    }

    #[test]
    fn test_discover_required_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "other.csv");
        assert!(matches!(discover_required(dir.path()), Err(Error::NoInputFiles(_))));
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&dir.path().join("absent")).is_err());
    }
}

//! Timestamp ranking for date-stamped artifact paths.
//!
//! Xcode-era tooling encodes creation time into artifact paths using two
//! mutually exclusive conventions:
//!
//! - xcarchive: dated directory plus dated file name with an optional
//!   trailing index, e.g.
//!   `Archives/2016-10-07/XamarinSampleApp.iOS 10-07-16 3.41 PM 2.xcarchive`
//! - ipa: a dated containing directory with an optional trailing index and
//!   no file date, e.g.
//!   `bin/iPhone/Release/Multiplatform.iOS 2016-10-06 22-45-23 2/Multiplatform.iOS.ipa`
//!
//! Parsing is best effort per layout: a name that does not match ranks with
//! a zero-value stamp instead of being rejected, matching the observed
//! fallback behavior of the tools themselves.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DIR_DATE_LAYOUT: &str = "%Y-%m-%d";
const ARCHIVE_FILE_DATE_LAYOUT: &str = "%m-%d-%y %I.%M %p";
const IPA_DIR_DATE_LAYOUT: &str = "%Y-%m-%d %H-%M-%S";

fn archive_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r".* (?P<date>[0-9-]+ [0-9.]+ [PM|AM]+) *(?P<count>|[0-9]+)\.xcarchive")
            .expect("archive file pattern is valid")
    })
}

fn ipa_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r".* (?P<date>[0-9-]+-[0-9-]+-[0-9-]+ [0-9-]+-[0-9-]+-[0-9-]+) *(?P<count>[0-9]+|)")
            .expect("ipa dir pattern is valid")
    })
}

/// A path plus whatever timestamps its name encodes. Ordering is directory
/// date, then file date, then trailing index; each level short-circuits, so
/// a newer directory date always wins regardless of file-level timestamps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Stamp {
    dir_date: Option<NaiveDate>,
    file_date: Option<NaiveDateTime>,
    index: u32,
}

/// Picks the newest-stamped path, parsing each path with `stamp`.
pub(crate) fn latest_by<F>(paths: Vec<PathBuf>, stamp: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> Stamp,
{
    paths.into_iter().max_by_key(|path| stamp(path.as_path()))
}

/// Stamp for `<archives>/<yyyy-mm-dd>/<Assembly> <m-d-yy h.mm AM> [n].xcarchive`.
pub(crate) fn archive_stamp(path: &Path) -> Stamp {
    let dir_date = path
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .and_then(|name| NaiveDate::parse_from_str(name, DIR_DATE_LAYOUT).ok());

    let mut file_date = None;
    let mut index = 0;
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        if let Some(captures) = archive_file_pattern().captures(name) {
            file_date = captures
                .name("date")
                .and_then(|m| NaiveDateTime::parse_from_str(m.as_str(), ARCHIVE_FILE_DATE_LAYOUT).ok());
            index = captures
                .name("count")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
        }
    }

    Stamp {
        dir_date,
        file_date,
        index,
    }
}

/// Stamp for `<out>/<Assembly> <yyyy-mm-dd hh-mm-ss> [n]/<Assembly>.ipa`;
/// only the containing directory is dated.
pub(crate) fn ipa_stamp(path: &Path) -> Stamp {
    let mut dir_date = None;
    let mut file_date = None;
    let mut index = 0;

    let dir_name = path
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str());
    if let Some(name) = dir_name {
        if let Some(captures) = ipa_dir_pattern().captures(name) {
            // The directory timestamp fills both ordering levels: the date
            // part alone, then the full datetime as the tiebreaker.
            file_date = captures
                .name("date")
                .and_then(|m| NaiveDateTime::parse_from_str(m.as_str(), IPA_DIR_DATE_LAYOUT).ok());
            dir_date = file_date.map(|dt| dt.date());
            index = captures
                .name("count")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
        }
    }

    Stamp {
        dir_date,
        file_date,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_directory_date_always_wins() {
        let paths = vec![
            PathBuf::from("/Archives/2016-10-07/App.iOS 10-07-16 3.41 PM 2.xcarchive"),
            PathBuf::from("/Archives/2017-10-09/App.iOS 01-01-17 9.00 AM.xcarchive"),
        ];

        let latest = latest_by(paths, archive_stamp).unwrap();
        assert!(latest.starts_with("/Archives/2017-10-09"));
    }

    #[test]
    fn file_date_breaks_directory_ties() {
        let paths = vec![
            PathBuf::from("/Archives/2016-10-07/App.iOS 10-07-16 3.41 PM.xcarchive"),
            PathBuf::from("/Archives/2016-10-07/App.iOS 10-07-16 5.02 PM.xcarchive"),
        ];

        let latest = latest_by(paths, archive_stamp).unwrap();
        assert!(latest.to_string_lossy().contains("5.02 PM"));
    }

    #[test]
    fn trailing_index_breaks_file_date_ties() {
        let paths = vec![
            PathBuf::from("/Archives/2016-10-07/App.iOS 10-07-16 3.41 PM.xcarchive"),
            PathBuf::from("/Archives/2016-10-07/App.iOS 10-07-16 3.41 PM 2.xcarchive"),
        ];

        let latest = latest_by(paths, archive_stamp).unwrap();
        assert!(latest.to_string_lossy().contains("PM 2.xcarchive"));
    }

    #[test]
    fn unparseable_names_rank_lowest_not_error() {
        let paths = vec![
            PathBuf::from("/Archives/scratch/App.iOS.xcarchive"),
            PathBuf::from("/Archives/2016-10-07/App.iOS 10-07-16 3.41 PM.xcarchive"),
        ];

        let latest = latest_by(paths, archive_stamp).unwrap();
        assert!(latest.starts_with("/Archives/2016-10-07"));
    }

    #[test]
    fn ipa_directory_date_and_index_ordering() {
        let paths = vec![
            PathBuf::from("/bin/Release/App.iOS 2016-10-06 11-45-23/App.iOS.ipa"),
            PathBuf::from("/bin/Release/App.iOS 2016-10-06 11-45-23 2/App.iOS.ipa"),
        ];

        let latest = latest_by(paths, ipa_stamp).unwrap();
        assert!(latest.to_string_lossy().contains("11-45-23 2/"));
    }

    #[test]
    fn ipa_newer_timestamp_wins_over_index() {
        let paths = vec![
            PathBuf::from("/bin/Release/App.iOS 2016-10-06 22-45-23/App.iOS.ipa"),
            PathBuf::from("/bin/Release/App.iOS 2016-10-06 11-45-23 5/App.iOS.ipa"),
        ];

        let latest = latest_by(paths, ipa_stamp).unwrap();
        assert!(latest.to_string_lossy().contains("22-45-23/"));
    }

    #[test]
    fn ipa_stamp_parses_all_components() {
        let stamp = ipa_stamp(Path::new(
            "/bin/Release/App.iOS 2016-10-06 22-45-23 2/App.iOS.ipa",
        ));
        assert_eq!(stamp.dir_date, NaiveDate::from_ymd_opt(2016, 10, 6));
        assert_eq!(
            stamp.file_date,
            NaiveDate::from_ymd_opt(2016, 10, 6).and_then(|d| d.and_hms_opt(22, 45, 23))
        );
        assert_eq!(stamp.index, 2);
    }

    #[test]
    fn archive_stamp_parses_all_components() {
        let stamp = archive_stamp(Path::new(
            "/Archives/2016-10-07/App.iOS 10-07-16 3.41 PM 2.xcarchive",
        ));
        assert_eq!(stamp.dir_date, NaiveDate::from_ymd_opt(2016, 10, 7));
        assert!(stamp.file_date.is_some());
        assert_eq!(stamp.index, 2);
    }
}

//! Migration version strings: the `\d{13}(v\d{3})?` format, filename
//! extraction, and the timestamp-derived version generator.

use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::{Result, TestTrackError};

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{13}(?:v\d{3})?)_[a-z\d_]+\.yml$").unwrap());

/// Pulls the version prefix out of a migration filename, rejecting anything
/// that doesn't match the fixed grammar — a "foreign file" in the migrate
/// directory is a load error, not silently skipped.
pub fn extract_version_from_filename(filename: &str) -> Result<String> {
    FILENAME_RE
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            TestTrackError::FilesystemError(format!(
                "found foreign file {filename} in testtrack/migrate"
            ))
        })
}

/// Builds `<YYYY><MM><DD><sssss>` (UTC seconds-into-day, zero-padded to 5
/// digits). If one or more files already share that base prefix, appends
/// `v001`, `v002`, … picking one past the last existing suffix so the
/// resulting total ordering is preserved under plain string sort.
pub fn generate_migration_version(migrate_dir: &Path, now: chrono::DateTime<chrono::Utc>) -> Result<String> {
    let base_version = format!(
        "{:04}{:02}{:02}{:05}",
        now.format("%Y").to_string().parse::<u32>().unwrap_or(0),
        now.format("%m").to_string().parse::<u32>().unwrap_or(0),
        now.format("%d").to_string().parse::<u32>().unwrap_or(0),
        seconds_into_day(&now),
    );

    let mut matches: Vec<String> = Vec::new();
    if migrate_dir.exists() {
        for entry in std::fs::read_dir(migrate_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(&base_version) {
                    matches.push(name.to_string());
                }
            }
        }
    }

    if matches.is_empty() {
        return Ok(base_version);
    }

    matches.sort();
    let last_match = matches.last().unwrap();
    let version = extract_version_from_filename(last_match)?;

    let next_suffix = if version.len() == 13 {
        1
    } else if version.len() == 17 {
        version[14..17]
            .parse::<u32>()
            .map_err(|_| TestTrackError::FilesystemError("couldn't parse file version".to_string()))?
            + 1
    } else {
        return Err(TestTrackError::FilesystemError(
            "unexpected file version length".to_string(),
        ));
    };

    Ok(format!("{base_version}v{next_suffix:03}"))
}

fn seconds_into_day(now: &chrono::DateTime<chrono::Utc>) -> u32 {
    use chrono::Timelike;
    now.hour() * 3600 + now.minute() * 60 + now.second()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extract_version_rejects_foreign_files() {
        assert!(extract_version_from_filename("README.md").is_err());
        assert_eq!(
            extract_version_from_filename("1234567890123_create_split_foo.yml").unwrap(),
            "1234567890123"
        );
        assert_eq!(
            extract_version_from_filename("1234567890123v002_create_split_foo.yml").unwrap(),
            "1234567890123v002"
        );
    }

    #[test]
    fn generate_increments_suffix_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 5).unwrap();
        let first = generate_migration_version(dir.path(), now).unwrap();
        assert_eq!(first.len(), 13);
        std::fs::write(dir.path().join(format!("{first}_create_split_foo.yml")), "").unwrap();
        let second = generate_migration_version(dir.path(), now).unwrap();
        assert_eq!(second, format!("{first}v001"));
        std::fs::write(dir.path().join(format!("{second}_create_split_bar.yml")), "").unwrap();
        let third = generate_migration_version(dir.path(), now).unwrap();
        assert_eq!(third, format!("{first}v002"));
    }

    #[test]
    fn versions_sort_lexicographically_in_generation_order() {
        let dir = tempfile::tempdir().unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 5).unwrap();
        let v1 = generate_migration_version(dir.path(), now).unwrap();
        std::fs::write(dir.path().join(format!("{v1}_create_split_foo.yml")), "").unwrap();
        let v2 = generate_migration_version(dir.path(), now).unwrap();
        assert!(v1 < v2);
    }
}

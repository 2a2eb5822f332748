use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::Bar;
use crate::errors::Result;

/// Encoding of the bar timestamps in a data file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampType {
    /// Seconds since epoch.
    #[default]
    UnixSec,
    /// Scaled seconds since epoch, divided by `10^decimals` on load.
    #[cfg_attr(feature = "serde", serde(alias = "ms"))]
    UnixMs,
    /// RFC 3339 date strings.
    Date,
}

/// Number of decimals of [`TimestampType::UnixMs`] timestamps when not configured.
pub const DEFAULT_TIMESTAMP_DECIMALS: u32 = 3;

/// Converts seconds since epoch to a UTC date time, with microsecond precision.
pub fn datetime_from_secs(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64).unwrap_or_default()
}

/// Rescales the timestamps of `bars` to seconds.
///
/// Only [`TimestampType::UnixMs`] is rescaled, by `10^decimals` (3 by default).
pub fn fix_timestamps(bars: &mut [Bar], kind: TimestampType, decimals: Option<u32>) {
    if kind != TimestampType::UnixMs {
        return;
    }
    let divisor = 10f64.powi(decimals.unwrap_or(DEFAULT_TIMESTAMP_DECIMALS) as i32);
    for bar in bars {
        bar.set_timestamp(bar.timestamp() / divisor);
    }
}

/// Accepts a number of seconds or an RFC 3339 date string.
#[cfg(feature = "serde")]
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(f64),
        Date(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Secs(secs) => Ok(secs),
        Raw::Date(date) => DateTime::parse_from_rfc3339(&date)
            .map(|dt| dt.timestamp_micros() as f64 / 1_000_000.0)
            .map_err(serde::de::Error::custom),
    }
}

/// Reads bars from `filepath`, rescales their timestamps and sorts them.
///
/// A `.csv` file is read as a table with one bar per row: headers are matched
/// case-insensitively, unknown columns are ignored and missing or empty cells
/// are `None`. Any other file is read as a JSON array of bars.
#[cfg(feature = "serde")]
pub fn get_bars_from_file(filepath: impl AsRef<Path>, kind: TimestampType, decimals: Option<u32>) -> Result<Vec<Bar>> {
    use std::{fs::File, io::BufReader};

    let filepath = filepath.as_ref();
    let file = File::open(filepath)?;
    let is_csv = filepath
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let mut bars: Vec<Bar> = if is_csv {
        read_csv_bars(file)?
    } else {
        serde_json::from_reader(BufReader::new(file))?
    };
    fix_timestamps(&mut bars, kind, decimals);
    bars.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
    Ok(bars)
}

#[cfg(feature = "serde")]
fn read_csv_bars(reader: impl std::io::Read) -> Result<Vec<Bar>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader
        .headers()?
        .iter()
        .map(str::to_ascii_lowercase)
        .collect::<csv::StringRecord>();
    reader.set_headers(headers);

    let mut bars = Vec::new();
    for record in reader.deserialize() {
        bars.push(record?);
    }
    Ok(bars)
}

/// Returns true if `name` matches a `prefix*suffix` pattern (exact match without `*`).
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name.ends_with(suffix)
        }
        None => name == pattern,
    }
}

/// Label of a file pattern: the part before `*`, stripped of separators.
pub fn pattern_label(pattern: &str) -> &str {
    match pattern.split_once('*') {
        Some((prefix, _)) => prefix.trim_matches(|c: char| c == '_' || c == '/' || c == '\\' || c.is_whitespace()),
        None => pattern,
    }
}

/// Lists the files under `dir` (recursively) whose name matches `pattern`, in path order.
///
/// ### Arguments
/// * `dir` - Root directory, a missing directory gives an empty list.
/// * `pattern` - `prefix*suffix` file name pattern.
/// * `skip` - Number of leading files to skip.
/// * `limit` - Maximum number of files to return.
pub fn list_bar_files(dir: &Path, pattern: &str, skip: Option<usize>, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, pattern: &str, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, pattern, files)?;
            } else if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| matches_pattern(name, pattern))
            {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    if dir.is_dir() {
        walk(dir, pattern, &mut files)?;
    }
    files.sort();

    Ok(files
        .into_iter()
        .skip(skip.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect())
}

/// Generates a random ID.
pub fn random_id() -> u32 {
    rand::random()
}

#[cfg(test)]
#[test]
fn pattern_matching() {
    assert!(matches_pattern("btc_2024_01.json", "btc_*.json"));
    assert!(matches_pattern("btc_.json", "btc_*.json"));
    assert!(!matches_pattern("eth_2024_01.json", "btc_*.json"));
    assert!(!matches_pattern("btc.json", "btc*c.json"));
    assert!(matches_pattern("anything", "*"));
    assert!(matches_pattern("bars.json", "bars.json"));
}

#[cfg(test)]
#[test]
fn pattern_labels() {
    assert_eq!(pattern_label("btc_range_*.json"), "btc_range");
    assert_eq!(pattern_label("bars.json"), "bars.json");
}

#[cfg(test)]
#[test]
fn millisecond_timestamps() {
    use crate::engine::BarBuilder;

    let mut bars = vec![BarBuilder::builder().timestamp(1_600_000_000_500.0).build().unwrap()];
    fix_timestamps(&mut bars, TimestampType::UnixMs, None);
    assert_eq!(bars[0].timestamp(), 1_600_000_000.5);

    fix_timestamps(&mut bars, TimestampType::UnixSec, None);
    assert_eq!(bars[0].timestamp(), 1_600_000_000.5);
}

#[cfg(test)]
#[test]
fn seconds_to_datetime() {
    let datetime = datetime_from_secs(1.25);
    assert_eq!(datetime.timestamp(), 1);
    assert_eq!(datetime.timestamp_subsec_millis(), 250);
}

#[cfg(test)]
#[test]
fn list_missing_directory() {
    let files = list_bar_files(Path::new("does/not/exist"), "*.json", None, None).unwrap();
    assert!(files.is_empty());
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn load_bars_from_json() {
    let dir = std::env::temp_dir().join(format!("simple-backtester-{}", random_id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bars_1.json");
    std::fs::write(
        &path,
        r#"[
            {"timestamp": 1600000060000, "bid": 10.0, "ask": 11.0},
            {"timestamp_unix": 1600000000000, "close": 9.5, "volume_buy": 2.0}
        ]"#,
    )
    .unwrap();

    let bars = get_bars_from_file(&path, TimestampType::UnixMs, Some(3)).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].timestamp(), 1_600_000_000.0);
    assert_eq!(bars[0].current_price(), 9.5);
    assert_eq!(bars[0].buy_volume(), Some(2.0));
    assert_eq!(bars[1].mid(), Some(10.5));

    std::fs::write(dir.join("bars_2.json"), r#"[{"timestamp": "2024-03-01T00:00:00Z", "close": 1.0}]"#).unwrap();
    let files = list_bar_files(&dir, "bars_*.json", Some(1), None).unwrap();
    assert_eq!(files, vec![dir.join("bars_2.json")]);

    let bars = get_bars_from_file(&files[0], TimestampType::Date, None).unwrap();
    assert_eq!(bars[0].datetime().to_rfc3339(), "2024-03-01T00:00:00+00:00");

    std::fs::remove_dir_all(&dir).ok();
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn load_bars_from_csv() {
    let dir = std::env::temp_dir().join(format!("simple-backtester-{}", random_id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("range_1.CSV");
    std::fs::write(
        &path,
        "TIMESTAMP_UNIX,Bid,Ask,close,volume_buy,volume_sell,ob_liquidity_bid,ob_liquidity_ask,price_change_count_up\n\
         1600000060000,10.0,11.0,,1.5,0.5,30,10,4\n\
         1600000000000,,,9.5,,,,,\n",
    )
    .unwrap();

    let bars = get_bars_from_file(&path, TimestampType::UnixMs, None).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].timestamp(), 1_600_000_000.0);
    assert_eq!(bars[0].bid(), None);
    assert_eq!(bars[0].current_price(), 9.5);
    assert_eq!(bars[0].buy_volume(), None);
    assert_eq!(bars[1].mid(), Some(10.5));
    assert_eq!(bars[1].buy_volume(), Some(1.5));
    assert_eq!(bars[1].sell_volume(), Some(0.5));
    assert_eq!(bars[1].bid_liquidity(), Some(30.0));
    assert_eq!(bars[1].ask_liquidity(), Some(10.0));
    assert_eq!(bars[1].high(), None);

    std::fs::remove_dir_all(&dir).ok();
}

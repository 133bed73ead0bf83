// ⚡ Max Loads - per-region peak from an hourly load sheet
// Sheet layout: hour timestamp | one column per region ... | system total

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Regions reported, in output order
pub const STATIONS: [&str; 8] = [
    "COAST", "EAST", "FAR_WEST", "NORTH", "NORTH_C", "SOUTHERN", "SOUTH_C", "WEST",
];

const TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Serial of 10000-01-01, the first day Excel cannot represent
const SERIAL_LIMIT: f64 = 2_958_466.0;

/// Extensions opened as spreadsheets rather than CSV
const WORKBOOK_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxLoad {
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Day")]
    pub day: u32,
    #[serde(rename = "Hour")]
    pub hour: u32,
    #[serde(rename = "Max Load")]
    pub max_load: f64,
}

/// Excel serial date in the 1900 date system
pub fn serial_to_datetime(serial: f64) -> Result<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..SERIAL_LIMIT).contains(&serial) {
        bail!("Excel serial date out of range: {}", serial);
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("invalid sheet epoch"))?;
    let seconds = (serial * 86_400.0).round() as i64;

    Duration::try_seconds(seconds)
        .and_then(|offset| epoch.checked_add_signed(offset))
        .ok_or_else(|| anyhow!("Excel serial date out of range: {}", serial))
}

/// Excel serial date or a plain text timestamp
pub fn parse_sheet_time(cell: &str) -> Result<NaiveDateTime> {
    let cell = cell.trim();

    if let Ok(serial) = cell.parse::<f64>() {
        return serial_to_datetime(serial);
    }

    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
        .ok_or_else(|| anyhow!("Unrecognized timestamp: {:?}", cell))
}

// ============================================================================
// PEAK TRACKING
// ============================================================================

/// Running maximum per region column
struct PeakTracker {
    regions: Vec<String>,
    /// (max value, time of first row holding it)
    peaks: Vec<Option<(f64, NaiveDateTime)>>,
}

impl PeakTracker {
    /// Column 0 is the hour, the last column is the system total
    fn new(headers: &[String], source: &Path) -> Result<Self> {
        if headers.len() < 3 {
            bail!("{} has no region columns", source.display());
        }
        let regions: Vec<String> = headers[1..headers.len() - 1]
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let peaks = vec![None; regions.len()];
        Ok(PeakTracker { regions, peaks })
    }

    fn observe(&mut self, time: NaiveDateTime, col: usize, value: f64) {
        let peak = &mut self.peaks[col];
        match peak {
            Some((max, _)) if value <= *max => {}
            _ => *peak = Some((value, time)),
        }
    }

    fn finish(self, source: &Path) -> Result<Vec<MaxLoad>> {
        STATIONS
            .iter()
            .map(|station| {
                let col = self
                    .regions
                    .iter()
                    .position(|r| r == station)
                    .ok_or_else(|| anyhow!("Station {} missing from {}", station, source.display()))?;
                let (max_load, time) =
                    self.peaks[col].ok_or_else(|| anyhow!("No rows in {}", source.display()))?;

                Ok(MaxLoad {
                    station: station.to_string(),
                    year: time.year(),
                    month: time.month(),
                    day: time.day(),
                    hour: time.hour(),
                    max_load,
                })
            })
            .collect()
    }
}

// ============================================================================
// SHEET READERS
// ============================================================================

/// Peak value and its hour for every station
///
/// Spreadsheet files (.xls, .xlsx, ...) are read from their first sheet;
/// anything else is treated as a CSV export of that sheet.
pub fn max_loads(path: &Path) -> Result<Vec<MaxLoad>> {
    if is_workbook(path) {
        workbook_max_loads(path)
    } else {
        csv_max_loads(path)
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn csv_max_loads(path: &Path) -> Result<Vec<MaxLoad>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open load sheet: {}", path.display()))?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut tracker = PeakTracker::new(&headers, path)?;

    for (row_num, result) in reader.records().enumerate() {
        let line = row_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV line {}", line))?;
        let time = parse_sheet_time(record.get(0).unwrap_or("")).with_context(|| format!("Line {}", line))?;

        for col in 0..tracker.regions.len() {
            let cell = record.get(col + 1).unwrap_or("").trim();
            let value: f64 = cell.parse().with_context(|| {
                format!("Line {}: {} is not a number: {:?}", line, tracker.regions[col], cell)
            })?;
            tracker.observe(time, col, value);
        }
    }

    tracker.finish(path)
}

fn workbook_max_loads(path: &Path) -> Result<Vec<MaxLoad>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no sheets", path.display()))?
        .with_context(|| format!("Failed to read first sheet of {}", path.display()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("{} has an empty first sheet", path.display()))?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    let mut tracker = PeakTracker::new(&headers, path)?;

    for (row_num, row) in rows.enumerate() {
        let line = row_num + 2;
        let time = row
            .first()
            .map(cell_time)
            .unwrap_or_else(|| Err(anyhow!("missing timestamp")))
            .with_context(|| format!("Row {}", line))?;

        for col in 0..tracker.regions.len() {
            let cell = row.get(col + 1).unwrap_or(&Data::Empty);
            let value = cell_value(cell).ok_or_else(|| {
                anyhow!("Row {}: {} is not a number: {:?}", line, tracker.regions[col], cell)
            })?;
            tracker.observe(time, col, value);
        }
    }

    tracker.finish(path)
}

fn cell_time(cell: &Data) -> Result<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64()),
        Data::Float(serial) => serial_to_datetime(*serial),
        Data::Int(serial) => serial_to_datetime(*serial as f64),
        Data::String(text) | Data::DateTimeIso(text) => parse_sheet_time(text),
        other => bail!("Not a timestamp: {:?}", other),
    }
}

fn cell_value(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(value) => Some(*value),
        Data::Int(value) => Some(*value as f64),
        Data::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Write `Station|Year|Month|Day|Hour|Max Load`
pub fn save_max_loads(rows: &[MaxLoad], path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'|')
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SHEET: &str = "\
Hour_End,COAST,EAST,FAR_WEST,NORTH,NORTH_C,SOUTHERN,SOUTH_C,WEST,ERCOT
2013-01-01 01:00,7606.26,1073.84,1411.71,784.24,10369.48,2206.67,4368.31,1005.18,28825.72
2013-06-26 17:00,9000.50,1500.00,2281.2722140000024,900.00,18000.00,4000.00,9000.00,1700.00,46000.00
2013-08-07 17:00,18779.03,1500.00,2100.00,1400.00,23961.84,5280.00,11000.00,1800.00,65000.00
";

    #[test]
    fn test_max_loads_per_station() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loads.csv");
        fs::write(&path, SHEET).unwrap();

        let rows = max_loads(&path).unwrap();

        assert_eq!(rows.len(), 8);
        let far_west = rows.iter().find(|r| r.station == "FAR_WEST").unwrap();
        assert_eq!(far_west.year, 2013);
        assert_eq!(far_west.month, 6);
        assert_eq!(far_west.day, 26);
        assert_eq!(far_west.hour, 17);
        assert_eq!(far_west.max_load, 2281.2722140000024);

        let coast = &rows[0];
        assert_eq!(coast.station, "COAST");
        assert_eq!((coast.month, coast.day), (8, 7));
    }

    #[test]
    fn test_ties_keep_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loads.csv");
        fs::write(&path, SHEET).unwrap();

        let rows = max_loads(&path).unwrap();
        // EAST peaks at 1500.00 twice; the June row comes first
        let east = rows.iter().find(|r| r.station == "EAST").unwrap();
        assert_eq!(east.month, 6);
    }

    #[test]
    fn test_missing_station() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loads.csv");
        fs::write(&path, "Hour_End,COAST,ERCOT\n2013-01-01 01:00,1.0,1.0\n").unwrap();

        let err = max_loads(&path).unwrap_err();
        assert!(err.to_string().contains("EAST"));
    }

    #[test]
    fn test_excel_serial_time() {
        let time = parse_sheet_time("41275.75").unwrap();
        assert_eq!(time.to_string(), "2013-01-01 18:00:00");

        let time = parse_sheet_time("41275.041666666664").unwrap();
        assert_eq!(time.hour(), 1);

        assert!(parse_sheet_time("yesterday").is_err());
    }

    #[test]
    fn test_out_of_range_serial_is_an_error() {
        for cell in ["1e300", "99999999", "-1", "NaN", "inf"] {
            assert!(parse_sheet_time(cell).is_err(), "{}", cell);
        }
        assert!(serial_to_datetime(f64::INFINITY).is_err());

        let last_day = serial_to_datetime(SERIAL_LIMIT - 1.0).unwrap();
        assert_eq!(last_day.year(), 9999);
    }

    #[test]
    fn test_out_of_range_time_cell_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loads.csv");
        fs::write(
            &path,
            "Hour_End,COAST,ERCOT\n2013-01-01 01:00,1.0,1.0\n1e300,2.0,2.0\n",
        )
        .unwrap();

        let err = max_loads(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Line 3"));
    }

    #[test]
    fn test_workbook_cells() {
        let time = cell_time(&Data::Float(41275.75)).unwrap();
        assert_eq!(time.to_string(), "2013-01-01 18:00:00");
        assert_eq!(
            cell_time(&Data::String("2013-01-01 01:00".to_string())).unwrap().hour(),
            1
        );
        assert!(cell_time(&Data::Empty).is_err());
        assert!(cell_time(&Data::Float(1e300)).is_err());

        assert_eq!(cell_value(&Data::Float(2281.5)), Some(2281.5));
        assert_eq!(cell_value(&Data::Int(7)), Some(7.0));
        assert_eq!(cell_value(&Data::String(" 12.5 ".to_string())), Some(12.5));
        assert_eq!(cell_value(&Data::Empty), None);
    }

    #[test]
    fn test_workbook_extension_dispatch() {
        assert!(is_workbook(Path::new("2013_ERCOT_Hourly_Load_Data.xls")));
        assert!(is_workbook(Path::new("loads.XLSX")));
        assert!(!is_workbook(Path::new("loads.csv")));
        assert!(!is_workbook(Path::new("loads")));
    }

    #[test]
    fn test_broken_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loads.xlsx");
        fs::write(&path, "not a spreadsheet").unwrap();

        assert!(max_loads(&path).is_err());
        assert!(max_loads(&dir.path().join("missing.xls")).is_err());
    }

    #[test]
    fn test_save_pipe_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2013_Max_Loads.csv");
        let rows = vec![MaxLoad {
            station: "FAR_WEST".to_string(),
            year: 2013,
            month: 6,
            day: 26,
            hour: 17,
            max_load: 2281.2722140000024,
        }];

        save_max_loads(&rows, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Station|Year|Month|Day|Hour|Max Load"));
        assert_eq!(lines.next(), Some("FAR_WEST|2013|6|26|17|2281.2722140000024"));
    }
}

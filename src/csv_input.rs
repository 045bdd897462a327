//! Readers for the CSV files of a results directory: sensor samples,
//! lifecycle markers, function-call traces and fio bandwidth logs.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;

use crate::error::DataError;
use crate::phase::Marker;
use crate::series::{Column, RawSamples, TIME};
use crate::trace::TraceRecord;

fn parse_cell(cell: Option<&str>) -> f64 {
    cell.and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Parse a sensor file: a `time` column in milliseconds plus any
/// number of numeric columns. Cells that are empty or not numbers
/// become NaN, and rows containing a NaN are dropped.
pub fn parse_sensor_csv(input: impl Read) -> Result<RawSamples> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h == TIME)
        .ok_or(DataError::MissingTimeColumn)?;

    let value_idxs: Vec<usize> = (0..headers.len()).filter(|i| *i != time_idx).collect();
    let mut time = Vec::new();
    let mut columns: Vec<Column> = value_idxs
        .iter()
        .map(|i| Column::new(&headers[*i], Vec::new()))
        .collect();
    let mut record = StringRecord::new();
    let mut incomplete = false;
    while reader.read_record(&mut record)? {
        let t = parse_cell(record.get(time_idx));
        if !t.is_finite() {
            continue;
        }
        time.push(t.round() as i64);
        for (column, i) in columns.iter_mut().zip(&value_idxs) {
            let v = parse_cell(record.get(*i));
            incomplete |= v.is_nan();
            column.values.push(v);
        }
    }
    let mut samples = RawSamples { time, columns };
    if incomplete {
        samples.drop_incomplete_rows();
    }
    Ok(samples)
}

pub fn read_sensor_csv(path: &Path) -> Result<RawSamples> {
    (|| -> Result<_> {
        let file = std::fs::File::open(path)?;
        parse_sensor_csv(file)
    })()
    .with_context(|| anyhow!("reading sensor file {path:?}"))
}

#[derive(Debug, Deserialize)]
struct MarkerRecord {
    time: f64,
    marker_name: String,
}

/// Markers in file order; ordering is checked where phases are built.
pub fn parse_markers_csv(input: impl Read) -> Result<Vec<Marker>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input);
    reader
        .deserialize::<MarkerRecord>()
        .map(|record| {
            let record = record?;
            Ok(Marker::new(record.marker_name, record.time.round() as i64))
        })
        .collect()
}

/// `None` if the run has no marker file.
pub fn read_markers_csv(path: &Path) -> Result<Option<Vec<Marker>>> {
    if !path.exists() {
        return Ok(None);
    }
    (|| -> Result<_> {
        let file = std::fs::File::open(path)?;
        parse_markers_csv(file)
    })()
    .map(Some)
    .with_context(|| anyhow!("reading marker file {path:?}"))
}

pub fn parse_trace_csv(input: impl Read) -> Result<Vec<TraceRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input);
    Ok(reader.deserialize().collect::<Result<_, _>>()?)
}

/// `None` if the run has no trace file.
pub fn read_trace_csv(path: &Path) -> Result<Option<Vec<TraceRecord>>> {
    if !path.exists() {
        return Ok(None);
    }
    (|| -> Result<_> {
        let file = std::fs::File::open(path)?;
        parse_trace_csv(file)
    })()
    .map(Some)
    .with_context(|| anyhow!("reading trace file {path:?}"))
}

/// A fio bandwidth log (`log_bw.*.log`, no header; columns are time
/// in ms, bandwidth in KiB/s, direction, offset, and one more). Rows
/// with the same time are summed; the result is ordered by time.
pub fn parse_fio_bw_log(input: impl Read) -> Result<Vec<(i64, f64)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);
    let mut by_time: BTreeMap<i64, f64> = BTreeMap::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        let t = parse_cell(record.get(0));
        let bw = parse_cell(record.get(1));
        if !t.is_finite() || bw.is_nan() {
            continue;
        }
        *by_time.entry(t.round() as i64).or_default() += bw;
    }
    Ok(by_time.into_iter().collect())
}

pub fn read_fio_bw_log(path: &Path) -> Result<Vec<(i64, f64)>> {
    (|| -> Result<_> {
        let file = std::fs::File::open(path)?;
        parse_fio_bw_log(file)
    })()
    .with_context(|| anyhow!("reading fio bandwidth log {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_sensor_csv() -> Result<()> {
        let input = "time,Total,Other\n0,1.5,2\n1,,3\n2,2.5,x\n3,3.5,4\n,9,9\n";
        let samples = parse_sensor_csv(input.as_bytes())?;
        assert_eq!(samples.time, [0, 3]);
        assert_eq!(samples.column_names().collect::<Vec<_>>(), ["Total", "Other"]);
        assert_eq!(samples.columns[0].values, [1.5, 3.5]);
        assert_eq!(samples.columns[1].values, [2., 4.]);
        Ok(())
    }

    #[test]
    fn t_parse_sensor_csv_time_not_first() -> Result<()> {
        let samples = parse_sensor_csv("read,time\n7,10\n8,11\n".as_bytes())?;
        assert_eq!(samples.time, [10, 11]);
        assert_eq!(samples.columns[0].values, [7., 8.]);
        Ok(())
    }

    #[test]
    fn t_parse_sensor_csv_without_time() {
        let err = parse_sensor_csv("a,b\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DataError>(),
            Some(&DataError::MissingTimeColumn)
        );
    }

    #[test]
    fn t_parse_markers_csv() -> Result<()> {
        let markers = parse_markers_csv("time,marker_name\n300,fileset-done\n700,bench-done\n".as_bytes())?;
        assert_eq!(
            markers,
            [
                Marker::new("fileset-done".into(), 300),
                Marker::new("bench-done".into(), 700)
            ]
        );
        Ok(())
    }

    #[test]
    fn t_missing_optional_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(read_markers_csv(&dir.path().join("markers.csv"))?, None);
        assert!(read_trace_csv(&dir.path().join("trace.csv"))?.is_none());
        Ok(())
    }

    #[test]
    fn t_parse_trace_csv() -> Result<()> {
        let input = "function,time,count,is_nvme_call,has_fs_pagewrite,requeued_io,vfs_read,vfs_write,vfs_fsync\n\
                     read+76,2000000,3,true,false,false,true,false,false\n";
        let records = parse_trace_csv(input.as_bytes())?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].function, "read+76");
        assert_eq!(records[0].time, 2_000_000);
        assert_eq!(records[0].count, 3.);
        assert!(records[0].is_nvme_call && records[0].vfs_read && !records[0].vfs_fsync);
        Ok(())
    }

    #[test]
    fn t_parse_fio_bw_log() -> Result<()> {
        let input = "1000, 2048, 0, 4096, 0\n1000, 1024, 1, 4096, 0\n500, 512, 0, 0, 0\n";
        assert_eq!(
            parse_fio_bw_log(input.as_bytes())?,
            [(500, 512.), (1000, 3072.)]
        );
        Ok(())
    }
}

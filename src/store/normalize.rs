//! Canonicalizes the raw timestamp column of an observation batch.

use crate::store::error::StoreError;
use chrono::NaiveDateTime;
use polars::prelude::*;

// The service reports local standard time as requested; no zone conversion.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y%m%d %H:%M",
    "%Y%m%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, StoreError> {
    let trimmed = raw.trim();
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    Err(StoreError::TimestampParse {
        value: raw.to_string(),
    })
}

/// Parses `field` into a timezone-naive millisecond timestamp column (position
/// preserved) and returns the frame sorted by it.
///
/// Accepts the `YYYYMMDD HH:MM` style strings the upstream service produces as
/// well as the dashed and `T`-separated ISO variants. A column that is already
/// a datetime passes through untouched; any other dtype, or a value that fits
/// none of the formats, is an error.
pub fn normalize_datetime(mut frame: DataFrame, field: &str) -> Result<DataFrame, StoreError> {
    let dtype = frame.column(field)?.dtype().clone();
    match dtype {
        DataType::Datetime(_, _) => {}
        DataType::String => {
            let stamps = {
                let values = frame.column(field)?.str()?;
                let mut stamps = Vec::with_capacity(values.len());
                for value in values.into_iter() {
                    let value = value.ok_or_else(|| StoreError::TimestampParse {
                        value: "<null>".to_string(),
                    })?;
                    stamps.push(parse_timestamp(value)?.and_utc().timestamp_millis());
                }
                stamps
            };
            let column = Int64Chunked::from_vec(field.into(), stamps)
                .into_datetime(TimeUnit::Milliseconds, None)
                .into_series();
            frame.with_column(column)?;
        }
        other => {
            return Err(StoreError::NotATimestamp {
                column: field.to_string(),
                dtype: other.to_string(),
            })
        }
    }
    Ok(frame.sort([field], SortMultipleOptions::default())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn millis(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn parses_compact_and_iso_styles() {
        assert_eq!(
            parse_timestamp("20100101 06:30").unwrap(),
            parse_timestamp("2010-01-01 06:30").unwrap()
        );
        assert_eq!(
            parse_timestamp("2010-01-01T06:30:00").unwrap(),
            parse_timestamp(" 2010-01-01 06:30:00 ").unwrap()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StoreError::TimestampParse { .. })
        ));
    }

    #[test]
    fn promotes_string_column_and_sorts() {
        let frame = df!(
            "Datetime" => ["2010-01-01 01:00", "2010-01-01 00:00"],
            "Value" => [4.0, 3.0],
        )
        .unwrap();

        let normalized = normalize_datetime(frame, "Datetime").unwrap();

        assert_eq!(
            normalized.column("Datetime").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
        // Sorted by timestamp, values follow their rows.
        let values: Vec<f64> = normalized
            .column("Value")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(values, vec![3.0, 4.0]);
        let stamps: Vec<i64> = normalized
            .column("Datetime")
            .unwrap()
            .datetime()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(stamps, vec![millis(2010, 1, 1, 0, 0), millis(2010, 1, 1, 1, 0)]);
    }

    #[test]
    fn keeps_column_position() {
        let frame = df!(
            "Value" => [1.0],
            "Datetime" => ["2010-01-01 00:00"],
        )
        .unwrap();
        let normalized = normalize_datetime(frame, "Datetime").unwrap();
        let names: Vec<String> = normalized
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["Value", "Datetime"]);
    }

    #[test]
    fn datetime_column_passes_through() {
        let frame = df!("Datetime" => ["2010-01-01 00:00"]).unwrap();
        let once = normalize_datetime(frame, "Datetime").unwrap();
        let twice = normalize_datetime(once.clone(), "Datetime").unwrap();
        assert!(once.equals(&twice));
    }

    #[test]
    fn rejects_numeric_column() {
        let frame = df!("Datetime" => [1i64, 2]).unwrap();
        assert!(matches!(
            normalize_datetime(frame, "Datetime"),
            Err(StoreError::NotATimestamp { .. })
        ));
    }
}

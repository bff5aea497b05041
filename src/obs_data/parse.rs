//! Decoding of datagetter payloads into observation points and frames.

use crate::obs_data::error::ObsDataError;
use crate::obs_data::fetch::Product;
use crate::store::table::{COL_DATETIME, COL_VALUE};
use crate::types::variable::WindField;
use log::warn;
use polars::prelude::*;
use serde::Deserialize;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::task;

/// Station metadata as the service reports it alongside JSON products.
/// Latitude and longitude arrive as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteMetadata {
    pub id: String,
    pub name: String,
    pub lat: String,
    pub lon: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

/// Envelope of every JSON product: either `metadata` + `data`, or `error`.
#[derive(Debug, Deserialize)]
pub struct ProductResponse<T> {
    pub metadata: Option<SiteMetadata>,
    pub data: Option<Vec<T>>,
    pub error: Option<ApiMessage>,
}

impl<T> ProductResponse<T> {
    /// Splits the envelope into metadata and observations. The service
    /// reports an empty window as an error with a "No data was found"
    /// message; that case decodes to an empty observation list instead of
    /// failing, so the caller can skip the window and move on.
    pub(crate) fn into_parts(
        self,
        product: Product,
    ) -> Result<(Option<SiteMetadata>, Vec<T>), ObsDataError> {
        if let Some(error) = self.error {
            return if error.message.to_lowercase().contains("no data was found") {
                Ok((self.metadata, Vec::new()))
            } else {
                Err(ObsDataError::Api {
                    product: product.query_value(),
                    message: error.message,
                })
            };
        }
        Ok((self.metadata, self.data.unwrap_or_default()))
    }
}

/// One verified hourly water level. `v` can be blank.
#[derive(Debug, Clone, Deserialize)]
pub struct WaterLevelObs {
    pub t: String,
    pub v: String,
}

/// One six-minute wind record. Any of the numeric fields can be blank.
#[derive(Debug, Clone, Deserialize)]
pub struct WindObs {
    pub t: String,
    pub s: String,
    pub d: String,
    pub g: String,
}

/// A parsed observation: raw timestamp string plus numeric value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObsPoint {
    pub t: String,
    pub value: f64,
}

/// Extracts water-level points, skipping records with a blank value.
pub(crate) fn water_level_points(
    observations: Vec<WaterLevelObs>,
) -> Result<Vec<ObsPoint>, ObsDataError> {
    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let raw = obs.v.trim();
        if raw.is_empty() {
            continue;
        }
        let value = raw.parse::<f64>().map_err(|_| ObsDataError::ValueParse {
            field: "v",
            value: obs.v.clone(),
        })?;
        points.push(ObsPoint { t: obs.t, value });
    }
    Ok(points)
}

/// Extracts one wind component from the shared wind records, skipping blanks.
pub(crate) fn wind_points(
    observations: &[WindObs],
    field: WindField,
) -> Result<Vec<ObsPoint>, ObsDataError> {
    let mut points = Vec::with_capacity(observations.len());
    for obs in observations {
        let (name, raw) = match field {
            WindField::Speed => ("s", &obs.s),
            WindField::Gust => ("g", &obs.g),
            WindField::Direction => ("d", &obs.d),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = trimmed.parse::<f64>().map_err(|_| ObsDataError::ValueParse {
            field: name,
            value: raw.clone(),
        })?;
        points.push(ObsPoint {
            t: obs.t.clone(),
            value,
        });
    }
    Ok(points)
}

pub(crate) const COL_TY: &str = "TY";

const CSV_DATETIME: &str = "Date Time";
const CSV_WATER_LEVEL: &str = "Water Level";

/// Reads a high/low CSV body into a frame of `Datetime`/`Value`/`TY`.
///
/// Header names come back with stray whitespace and so do the `TY` tags
/// ("HH ", "L ", ...); both are trimmed, tags are lowercased, and rows
/// without a water level are dropped.
pub(crate) async fn read_high_low_csv(
    body: String,
    station: &str,
) -> Result<DataFrame, ObsDataError> {
    let station_owned = station.to_string();
    task::spawn_blocking(move || {
        let mut temp_file = NamedTempFile::new().map_err(|e| ObsDataError::CsvReadIo {
            station: station_owned.clone(),
            source: e,
        })?;
        temp_file
            .write_all(body.as_bytes())
            .map_err(|e| ObsDataError::CsvReadIo {
                station: station_owned.clone(),
                source: e,
            })?;
        temp_file.flush().map_err(|e| ObsDataError::CsvReadIo {
            station: station_owned.clone(),
            source: e,
        })?;

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
            .map_err(|e| ObsDataError::CsvReadPolars {
                station: station_owned.clone(),
                source: e,
            })?
            .finish()
            .map_err(|e| ObsDataError::CsvReadPolars {
                station: station_owned.clone(),
                source: e,
            })?;

        tidy_high_low_frame(frame, &station_owned)
    })
    .await?
}

fn tidy_high_low_frame(mut frame: DataFrame, station: &str) -> Result<DataFrame, ObsDataError> {
    let renames: Vec<(String, String)> = frame
        .get_column_names()
        .iter()
        .filter(|name| name.as_str() != name.trim())
        .map(|name| (name.to_string(), name.trim().to_string()))
        .collect();
    for (from, to) in renames {
        frame.rename(&from, to.into())?;
    }

    for required in [CSV_DATETIME, CSV_WATER_LEVEL, COL_TY] {
        if frame.column(required).is_err() {
            warn!(
                "high/low CSV for station {} is missing column '{}'",
                station, required
            );
            return Err(ObsDataError::MissingCsvColumn {
                station: station.to_string(),
                column: required,
            });
        }
    }

    let tidied = frame
        .lazy()
        .select([
            col(CSV_DATETIME).alias(COL_DATETIME),
            col(CSV_WATER_LEVEL).cast(DataType::Float64).alias(COL_VALUE),
            col(COL_TY)
                .str()
                .strip_chars(lit(NULL))
                .str()
                .to_lowercase()
                .alias(COL_TY),
        ])
        .filter(col(COL_VALUE).is_not_null())
        .collect()?;
    Ok(tidied)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER_LEVEL_BODY: &str = r#"{
        "metadata": {"id": "8639348", "name": "Money Point", "lat": "36.7783", "lon": "-76.3019"},
        "data": [
            {"t": "2010-01-01 00:00", "v": "1.235", "s": "0.003", "f": "0,0,0,0", "q": "v"},
            {"t": "2010-01-01 01:00", "v": "", "s": "", "f": "0,0,0,0", "q": "v"},
            {"t": "2010-01-01 02:00", "v": "-0.401", "s": "0.002", "f": "0,0,0,0", "q": "v"}
        ]
    }"#;

    const NO_DATA_BODY: &str = r#"{
        "error": {"message": "No data was found. This product may not be offered at this station at the requested time."}
    }"#;

    #[test]
    fn water_level_envelope_decodes() {
        let response: ProductResponse<WaterLevelObs> =
            serde_json::from_str(WATER_LEVEL_BODY).unwrap();
        let (metadata, observations) = response.into_parts(Product::HourlyHeight).unwrap();
        let metadata = metadata.unwrap();
        assert_eq!(metadata.id, "8639348");
        assert_eq!(metadata.name, "Money Point");
        assert_eq!(observations.len(), 3);
    }

    #[test]
    fn blank_values_are_skipped_not_errors() {
        let response: ProductResponse<WaterLevelObs> =
            serde_json::from_str(WATER_LEVEL_BODY).unwrap();
        let (_, observations) = response.into_parts(Product::HourlyHeight).unwrap();
        let points = water_level_points(observations).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].t, "2010-01-01 00:00");
        assert_eq!(points[0].value, 1.235);
        assert_eq!(points[1].value, -0.401);
    }

    #[test]
    fn unparseable_value_is_an_error() {
        let observations = vec![WaterLevelObs {
            t: "2010-01-01 00:00".to_string(),
            v: "1.2.3".to_string(),
        }];
        assert!(matches!(
            water_level_points(observations),
            Err(ObsDataError::ValueParse { field: "v", .. })
        ));
    }

    #[test]
    fn no_data_message_reads_as_empty_window() {
        let response: ProductResponse<WaterLevelObs> = serde_json::from_str(NO_DATA_BODY).unwrap();
        let (metadata, observations) = response.into_parts(Product::HourlyHeight).unwrap();
        assert!(metadata.is_none());
        assert!(observations.is_empty());
    }

    #[test]
    fn other_service_messages_are_fatal() {
        let body = r#"{"error": {"message": "Wrong Date Order: Start Date is after End Date"}}"#;
        let response: ProductResponse<WaterLevelObs> = serde_json::from_str(body).unwrap();
        assert!(matches!(
            response.into_parts(Product::HourlyHeight),
            Err(ObsDataError::Api { .. })
        ));
    }

    #[test]
    fn wind_components_extract_independently() {
        let body = r#"{
            "metadata": {"id": "8639348", "name": "Money Point", "lat": "36.7783", "lon": "-76.3019"},
            "data": [
                {"t": "2010-01-01 00:00", "s": "5.20", "d": "120.0", "dr": "ESE", "g": "7.10", "f": "0,0"},
                {"t": "2010-01-01 00:06", "s": "5.40", "d": "", "dr": "", "g": "7.30", "f": "0,0"}
            ]
        }"#;
        let response: ProductResponse<WindObs> = serde_json::from_str(body).unwrap();
        let (_, observations) = response.into_parts(Product::Wind).unwrap();

        let speed = wind_points(&observations, WindField::Speed).unwrap();
        assert_eq!(speed.len(), 2);
        assert_eq!(speed[1].value, 5.4);

        // Blank direction in the second record drops only that point.
        let direction = wind_points(&observations, WindField::Direction).unwrap();
        assert_eq!(direction.len(), 1);
        assert_eq!(direction[0].value, 120.0);

        let gust = wind_points(&observations, WindField::Gust).unwrap();
        assert_eq!(gust.len(), 2);
    }

    #[tokio::test]
    async fn high_low_csv_tidies_headers_and_tags() {
        let body = "\
Date Time, Water Level, Sigma, TY, I, L
2010-01-01 05:06,1.486,0.000,HH ,0,0
2010-01-01 11:30,-1.313,0.000,L ,0,0
2010-01-01 17:54,1.102,0.000,H ,0,0
2010-01-02 00:12,,0.000,LL ,0,0
"
        .to_string();

        let frame = read_high_low_csv(body, "8639348").await.unwrap();
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["Datetime", "Value", "TY"]);
        // The blank LL water level is dropped.
        assert_eq!(frame.height(), 3);

        let tags: Vec<&str> = frame
            .column("TY")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(tags, vec!["hh", "l", "h"]);

        let values: Vec<f64> = frame
            .column("Value")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(values, vec![1.486, -1.313, 1.102]);
    }

    #[tokio::test]
    async fn high_low_csv_requires_the_known_columns() {
        let body = "Some Column,Another\n1,2\n".to_string();
        assert!(matches!(
            read_high_low_csv(body, "8639348").await,
            Err(ObsDataError::MissingCsvColumn { .. })
        ));
    }
}

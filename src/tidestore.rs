//! This module provides the main entry point for ingesting NOAA CO-OPS
//! observations. It wires the fetch client to the local observation store and
//! exposes one operation per upstream product, each of which can be re-run
//! over overlapping date ranges without ever duplicating a stored row.

use crate::error::TidestoreError;
use crate::obs_data::fetch::{CoopsClient, Product};
use crate::obs_data::parse::{
    read_high_low_csv, water_level_points, wind_points, ObsPoint, ProductResponse, WaterLevelObs,
    WindObs, COL_TY,
};
use crate::store::normalize::normalize_datetime;
use crate::store::obs_store::ObsStore;
use crate::store::table::{
    IdentityKey, Table, COL_DATETIME, COL_QC_ID, COL_SITE_ID, COL_VALUE, COL_VARIABLE_ID,
};
use crate::types::date_window::DateWindow;
use crate::types::site::SiteDef;
use crate::types::variable::{TideExtreme, Units, VariableDef, WindField};
use crate::utils::default_store_dir;
use bon::bon;
use log::info;
use polars::prelude::*;
use std::path::PathBuf;

const SOURCE_ORG: &str = "NOAA";

// Daily extremes arrive verified; everything else carries no QC flag.
const QC_VERIFIED: i64 = 2;

const WIND_WINDOW_DAYS: u32 = 31;

/// Counts for one ingestion run. `observations` is the number of parseable
/// points fetched, not the number of rows that turned out to be new — the
/// store logs the per-append split.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Date windows queried.
    pub windows: usize,
    /// Windows the service had no data for.
    pub empty_windows: usize,
    /// Parseable observation points across all windows.
    pub observations: usize,
}

/// The main client for ingesting CO-OPS observations into a local store.
///
/// Each ingestion operation resolves the station and variable to stable
/// surrogate IDs (creating their reference rows on first sight), fetches the
/// requested date range window by window, and appends only the observations
/// whose identity key is not stored yet. Running the same ingest twice leaves
/// the store exactly as one run did.
///
/// # Examples
///
/// ```rust
/// # use tidestore::{Tidestore, TidestoreError};
/// # async fn run() -> Result<(), TidestoreError> {
/// let client = Tidestore::new().await?;
/// let report = client
///     .ingest_hourly_heights()
///     .station("8639348")
///     .start_year(2010)
///     .end_year(2016)
///     .call()
///     .await?;
/// println!(
///     "{} observations over {} windows",
///     report.observations, report.windows
/// );
/// # Ok(())
/// # }
/// ```
pub struct Tidestore {
    store: ObsStore,
    client: CoopsClient,
}

#[bon]
impl Tidestore {
    /// Creates a client over the default store directory (resolved with the
    /// `dirs` crate, e.g. `~/.local/share/tidestore` on Linux).
    pub async fn new() -> Result<Self, TidestoreError> {
        let store_dir = default_store_dir().ok_or(TidestoreError::StoreDirResolution)?;
        Self::with_store_dir(store_dir).await
    }

    /// Creates a client over an explicit store directory, creating it if
    /// needed.
    pub async fn with_store_dir(dir: impl Into<PathBuf>) -> Result<Self, TidestoreError> {
        Ok(Tidestore {
            store: ObsStore::open(dir).await?,
            client: CoopsClient::new(),
        })
    }

    /// Assembles a client from an already-open store and a custom fetch
    /// client (e.g. one pointed at a test server).
    pub fn from_parts(store: ObsStore, client: CoopsClient) -> Self {
        Tidestore { store, client }
    }

    pub fn store(&self) -> &ObsStore {
        &self.store
    }

    /// Ingests verified hourly water levels for one station, one calendar
    /// year per request.
    ///
    /// The first response that carries station metadata resolves the site
    /// row (code, name, coordinates, source organization). Observations are
    /// deduplicated on (site, variable, instant): re-fetching a window that
    /// was already stored appends nothing, even when the service reports a
    /// corrected value for a stored instant.
    ///
    /// # Arguments
    ///
    /// * `.station(&str)`: **Required.** The CO-OPS station number.
    /// * `.start_year(i32)` / `.end_year(i32)`: **Required.** Inclusive year range.
    /// * `.units(Units)`: Optional. Defaults to [`Units::English`].
    #[builder]
    pub async fn ingest_hourly_heights(
        &self,
        station: &str,
        start_year: i32,
        end_year: i32,
        units: Option<Units>,
    ) -> Result<IngestReport, TidestoreError> {
        let units = units.unwrap_or_default();
        let variable_id = self
            .store
            .resolve_id(&VariableDef::hourly_height(units))
            .await?;
        let windows = DateWindow::yearly(start_year..=end_year);
        let mut report = IngestReport {
            windows: windows.len(),
            ..IngestReport::default()
        };
        let mut site_id: Option<i64> = None;

        for window in &windows {
            let response: ProductResponse<WaterLevelObs> = self
                .client
                .fetch_window(window, station, Product::HourlyHeight, units)
                .await?;
            let (metadata, observations) = response.into_parts(Product::HourlyHeight)?;
            if site_id.is_none() {
                if let Some(metadata) = &metadata {
                    let site = SiteDef::from_metadata(metadata, SOURCE_ORG)?;
                    site_id = Some(self.store.resolve_id(&site).await?);
                }
            }
            let points = water_level_points(observations)?;
            if points.is_empty() {
                info!(
                    "no {} data for station {} between {} and {}",
                    Product::HourlyHeight,
                    station,
                    window.begin,
                    window.end
                );
                report.empty_windows += 1;
                continue;
            }
            let site_id = site_id.ok_or(crate::ObsDataError::MissingMetadata(
                Product::HourlyHeight.query_value(),
            ))?;
            let batch = observation_batch(&points, site_id, variable_id, None)?;
            report.observations += points.len();
            self.store
                .append_unique(
                    Table::DataValues,
                    batch,
                    IdentityKey::SeriesInstant,
                    Some(site_id),
                )
                .await?;
        }
        Ok(report)
    }

    /// Ingests six-minute wind observations for one station.
    ///
    /// The range is chunked into ~31-day windows (the service caps how much
    /// six-minute data one request may span). Every window is fetched once
    /// and its speed, gust and direction components are stored as three
    /// separate variables (`WSF6`, `WGF6`, `WDF6`), each deduplicated on
    /// (site, variable, instant).
    ///
    /// # Arguments
    ///
    /// * `.station(&str)`: **Required.** The CO-OPS station number.
    /// * `.start_year(i32)` / `.end_year(i32)`: **Required.** Inclusive year range.
    /// * `.units(Units)`: Optional. Defaults to [`Units::English`].
    #[builder]
    pub async fn ingest_wind(
        &self,
        station: &str,
        start_year: i32,
        end_year: i32,
        units: Option<Units>,
    ) -> Result<IngestReport, TidestoreError> {
        let units = units.unwrap_or_default();
        let mut variable_ids = Vec::with_capacity(WindField::ALL.len());
        for field in WindField::ALL {
            let id = self.store.resolve_id(&field.variable()).await?;
            variable_ids.push((field, id));
        }
        let windows = DateWindow::stepped(start_year..=end_year, WIND_WINDOW_DAYS);
        let mut report = IngestReport {
            windows: windows.len(),
            ..IngestReport::default()
        };
        let mut site_id: Option<i64> = None;

        for window in &windows {
            let response: ProductResponse<WindObs> = self
                .client
                .fetch_window(window, station, Product::Wind, units)
                .await?;
            let (metadata, observations) = response.into_parts(Product::Wind)?;
            if site_id.is_none() {
                if let Some(metadata) = &metadata {
                    let site = SiteDef::from_metadata(metadata, SOURCE_ORG)?;
                    site_id = Some(self.store.resolve_id(&site).await?);
                }
            }
            if observations.is_empty() {
                info!(
                    "no {} data for station {} between {} and {}",
                    Product::Wind,
                    station,
                    window.begin,
                    window.end
                );
                report.empty_windows += 1;
                continue;
            }
            let site_id = site_id.ok_or(crate::ObsDataError::MissingMetadata(
                Product::Wind.query_value(),
            ))?;
            for (field, variable_id) in &variable_ids {
                let points = wind_points(&observations, *field)?;
                if points.is_empty() {
                    continue;
                }
                let batch = observation_batch(&points, site_id, *variable_id, None)?;
                report.observations += points.len();
                self.store
                    .append_unique(
                        Table::DataValues,
                        batch,
                        IdentityKey::SeriesInstant,
                        Some(site_id),
                    )
                    .await?;
            }
        }
        Ok(report)
    }

    /// Ingests verified daily high/low water levels for one station.
    ///
    /// Yearly windows are fetched as CSV, concatenated, and regrouped per
    /// extreme tag (`high_tide`, `high_high_tide`, `low_tide`,
    /// `low_low_tide`). The site row is created from the station code alone
    /// when absent. Unlike the other products, the identity key here
    /// includes the value, so a republished extreme with a corrected value
    /// is stored as an additional row rather than dropped as a duplicate.
    ///
    /// # Arguments
    ///
    /// * `.station(&str)`: **Required.** The CO-OPS station number.
    /// * `.start_year(i32)` / `.end_year(i32)`: **Required.** Inclusive year range.
    /// * `.units(Units)`: Optional. Defaults to [`Units::English`].
    #[builder]
    pub async fn ingest_daily_extremes(
        &self,
        station: &str,
        start_year: i32,
        end_year: i32,
        units: Option<Units>,
    ) -> Result<IngestReport, TidestoreError> {
        let units = units.unwrap_or_default();
        let windows = DateWindow::yearly(start_year..=end_year);
        let mut report = IngestReport {
            windows: windows.len(),
            ..IngestReport::default()
        };

        let mut combined: Option<DataFrame> = None;
        for window in &windows {
            let body = self.client.fetch_window_csv(window, station, units).await?;
            let frame = read_high_low_csv(body, station).await?;
            if frame.is_empty() {
                info!(
                    "no {} data for station {} between {} and {}",
                    Product::HighLow,
                    station,
                    window.begin,
                    window.end
                );
                report.empty_windows += 1;
                continue;
            }
            match combined.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&frame)?;
                }
                None => combined = Some(frame),
            }
        }
        let Some(combined) = combined else {
            return Ok(report);
        };

        let site_id = self.store.resolve_id(&SiteDef::partial(station)).await?;
        for tag in extreme_tags(&combined)? {
            let extreme = TideExtreme::from_tag(&tag)?;
            let variable_id = self.store.resolve_id(&extreme.variable()).await?;
            info!(
                "inserting {} values at site {}",
                extreme.variable().code(),
                station
            );
            let batch = extreme_batch(&combined, &tag, site_id, variable_id)?;
            report.observations += batch.height();
            self.store
                .append_unique(
                    Table::DataValues,
                    batch,
                    IdentityKey::SeriesInstantValue,
                    Some(site_id),
                )
                .await?;
        }
        Ok(report)
    }

    /// All stored observations of one variable, ordered by `Datetime`.
    ///
    /// # Arguments
    ///
    /// * `.variable_id(i64)`: **Required.** Surrogate ID of the variable.
    /// * `.site_id(i64)`: Optional. Restrict to one site.
    #[builder]
    pub async fn observations(
        &self,
        variable_id: i64,
        site_id: Option<i64>,
    ) -> Result<DataFrame, TidestoreError> {
        Ok(self
            .store
            .series_for_variable(variable_id, site_id)
            .await?)
    }

    /// Returns the surrogate ID of a site, creating its row when absent.
    pub async fn resolve_site(&self, site: &SiteDef) -> Result<i64, TidestoreError> {
        Ok(self.store.resolve_id(site).await?)
    }

    /// Returns the surrogate ID of a variable, creating its row when absent.
    pub async fn resolve_variable(&self, variable: &VariableDef) -> Result<i64, TidestoreError> {
        Ok(self.store.resolve_id(variable).await?)
    }
}

/// Tags one fetched point list with its site and variable IDs and
/// normalizes the timestamp column.
fn observation_batch(
    points: &[ObsPoint],
    site_id: i64,
    variable_id: i64,
    qc_id: Option<i64>,
) -> Result<DataFrame, crate::StoreError> {
    let stamps: Vec<&str> = points.iter().map(|p| p.t.as_str()).collect();
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mut batch = df!(
        COL_DATETIME => stamps,
        COL_SITE_ID => vec![site_id; points.len()],
        COL_VARIABLE_ID => vec![variable_id; points.len()],
        COL_VALUE => values,
    )?;
    if let Some(qc_id) = qc_id {
        batch.with_column(Series::new(COL_QC_ID.into(), vec![qc_id; points.len()]))?;
    }
    normalize_datetime(batch, COL_DATETIME)
}

/// Distinct extreme tags present in a tidied high/low frame, in pivot order.
fn extreme_tags(combined: &DataFrame) -> Result<Vec<String>, crate::StoreError> {
    let tags = combined
        .column(COL_TY)?
        .str()?
        .unique()?
        .sort(false);
    Ok(tags.into_no_null_iter().map(str::to_string).collect())
}

/// One extreme's rows shaped into a store batch with `QCID` set.
fn extreme_batch(
    combined: &DataFrame,
    tag: &str,
    site_id: i64,
    variable_id: i64,
) -> Result<DataFrame, crate::StoreError> {
    let batch = combined
        .clone()
        .lazy()
        .filter(col(COL_TY).eq(lit(tag.to_string())))
        .select([
            col(COL_DATETIME),
            lit(site_id).alias(COL_SITE_ID),
            lit(variable_id).alias(COL_VARIABLE_ID),
            col(COL_VALUE),
            lit(QC_VERIFIED).alias(COL_QC_ID),
        ])
        .collect()?;
    normalize_datetime(batch, COL_DATETIME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_client() -> (TempDir, Tidestore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let client = Tidestore::with_store_dir(dir.path())
            .await
            .expect("open client");
        (dir, client)
    }

    fn points() -> Vec<ObsPoint> {
        vec![
            ObsPoint {
                t: "2010-01-01 01:00".to_string(),
                value: 4.0,
            },
            ObsPoint {
                t: "2010-01-01 00:00".to_string(),
                value: 3.0,
            },
        ]
    }

    #[test]
    fn observation_batch_shapes_and_sorts() {
        let batch = observation_batch(&points(), 1, 2, None).unwrap();
        let names: Vec<String> = batch
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["Datetime", "SiteID", "VariableID", "Value"]);
        let values: Vec<f64> = batch
            .column(COL_VALUE)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(values, vec![3.0, 4.0]);
    }

    #[test]
    fn observation_batch_carries_qc_when_given() {
        let batch = observation_batch(&points(), 1, 2, Some(QC_VERIFIED)).unwrap();
        let qc: Vec<i64> = batch
            .column(COL_QC_ID)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(qc, vec![2, 2]);
    }

    #[tokio::test]
    async fn resolver_passthroughs_share_the_store() {
        let (_dir, client) = open_client().await;
        let site = SiteDef::partial("8639348");
        let id = client.resolve_site(&site).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(client.resolve_site(&site).await.unwrap(), 1);

        let variable = VariableDef::hourly_height(Units::English);
        assert_eq!(client.resolve_variable(&variable).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn observations_query_returns_the_stored_series() {
        let (_dir, client) = open_client().await;
        let site_id = client
            .resolve_site(&SiteDef::partial("8639348"))
            .await
            .unwrap();
        let variable_id = client
            .resolve_variable(&VariableDef::partial("WSF6"))
            .await
            .unwrap();
        let batch = observation_batch(&points(), site_id, variable_id, None).unwrap();
        client
            .store()
            .append_unique(
                Table::DataValues,
                batch,
                IdentityKey::SeriesInstant,
                Some(site_id),
            )
            .await
            .unwrap();

        let series = client
            .observations()
            .variable_id(variable_id)
            .site_id(site_id)
            .call()
            .await
            .unwrap();
        assert_eq!(series.height(), 2);
    }

    #[tokio::test]
    async fn extreme_batches_regroup_by_tag() {
        let combined = df!(
            COL_DATETIME => ["2010-01-01 05:06", "2010-01-01 11:30", "2010-01-02 05:54"],
            COL_VALUE => [1.486, -1.313, 1.502],
            COL_TY => ["hh", "l", "hh"],
        )
        .unwrap();

        let tags = extreme_tags(&combined).unwrap();
        assert_eq!(tags, vec!["hh", "l"]);

        let batch = extreme_batch(&combined, "hh", 1, 4).unwrap();
        assert_eq!(batch.height(), 2);
        let names: Vec<String> = batch
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            vec!["Datetime", "SiteID", "VariableID", "Value", "QCID"]
        );
        let qc: Vec<i64> = batch
            .column(COL_QC_ID)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(qc, vec![2, 2]);
    }
}

//! Candidate site records for the `sites` reference table.

use crate::obs_data::error::ObsDataError;
use crate::obs_data::parse::SiteMetadata;
use crate::store::table::{
    RefEntity, Table, COL_LAT, COL_LON, COL_SITE_CODE, COL_SITE_ID, COL_SITE_NAME, COL_SOURCE_ORG,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A station as a candidate row for the `sites` table.
///
/// `Full` carries the metadata the service reports next to its observations;
/// `Partial` is just the station code, used by ingestion paths that never see
/// metadata (the daily-extremes CSV). A partial row persists nulls for the
/// descriptive columns; choosing that is explicit here, not an accident of a
/// missing dict key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SiteDef {
    Full {
        code: String,
        name: String,
        source_org: String,
        lat: f64,
        lon: f64,
    },
    Partial {
        code: String,
    },
}

impl SiteDef {
    pub fn partial(code: impl Into<String>) -> Self {
        SiteDef::Partial { code: code.into() }
    }

    pub fn code(&self) -> &str {
        match self {
            SiteDef::Full { code, .. } => code,
            SiteDef::Partial { code } => code,
        }
    }

    /// Builds a full site from response metadata. The service reports
    /// latitude and longitude as strings; they must parse as numbers.
    pub fn from_metadata(
        metadata: &SiteMetadata,
        source_org: &str,
    ) -> Result<Self, ObsDataError> {
        let lat = metadata
            .lat
            .trim()
            .parse::<f64>()
            .map_err(|_| ObsDataError::ValueParse {
                field: "lat",
                value: metadata.lat.clone(),
            })?;
        let lon = metadata
            .lon
            .trim()
            .parse::<f64>()
            .map_err(|_| ObsDataError::ValueParse {
                field: "lon",
                value: metadata.lon.clone(),
            })?;
        Ok(SiteDef::Full {
            code: metadata.id.clone(),
            name: metadata.name.clone(),
            source_org: source_org.to_string(),
            lat,
            lon,
        })
    }
}

impl RefEntity for SiteDef {
    const TABLE: Table = Table::Sites;
    const ID_COLUMN: &'static str = COL_SITE_ID;
    const CODE_COLUMN: &'static str = COL_SITE_CODE;

    fn natural_key(&self) -> &str {
        self.code()
    }

    fn to_row(&self, id: i64) -> PolarsResult<DataFrame> {
        let (code, name, source_org, lat, lon) = match self {
            SiteDef::Full {
                code,
                name,
                source_org,
                lat,
                lon,
            } => (
                code.as_str(),
                Some(name.as_str()),
                Some(source_org.as_str()),
                Some(*lat),
                Some(*lon),
            ),
            SiteDef::Partial { code } => (code.as_str(), None, None, None, None),
        };
        df!(
            COL_SITE_ID => [id],
            COL_SITE_CODE => [code],
            COL_SITE_NAME => [name],
            COL_SOURCE_ORG => [source_org],
            COL_LAT => [lat],
            COL_LON => [lon],
        )
    }
}

//! Defines the three logical tables of the observation store, their on-disk
//! schemas, and the typed identity keys used when deduplicating appends.

use polars::prelude::{DataFrame, DataType, Field, PolarsResult, Schema, TimeUnit};
use std::fmt;

pub const COL_SITE_ID: &str = "SiteID";
pub const COL_SITE_CODE: &str = "SiteCode";
pub const COL_SITE_NAME: &str = "SiteName";
pub const COL_SOURCE_ORG: &str = "SourceOrg";
pub const COL_LAT: &str = "Lat";
pub const COL_LON: &str = "Lon";

pub const COL_VARIABLE_ID: &str = "VariableID";
pub const COL_VARIABLE_CODE: &str = "VariableCode";
pub const COL_VARIABLE_NAME: &str = "VariableName";
pub const COL_UNITS: &str = "Units";

pub const COL_DATETIME: &str = "Datetime";
pub const COL_VALUE: &str = "Value";
pub const COL_QC_ID: &str = "QCID";

/// The logical tables held by an [`crate::ObsStore`].
///
/// `Sites` and `Variables` are reference tables: append-only rows keyed by a
/// store-assigned surrogate ID and a unique natural code. `DataValues` holds
/// the observations themselves, ordered by their `Datetime` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Sites,
    Variables,
    DataValues,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Sites => "sites",
            Table::Variables => "variables",
            Table::DataValues => "datavalues",
        }
    }

    pub(crate) fn file_name(&self) -> String {
        format!("{}.parquet", self.name())
    }

    /// Column names in their persisted order.
    pub(crate) fn column_names(&self) -> Vec<&'static str> {
        match self {
            Table::Sites => vec![
                COL_SITE_ID,
                COL_SITE_CODE,
                COL_SITE_NAME,
                COL_SOURCE_ORG,
                COL_LAT,
                COL_LON,
            ],
            Table::Variables => vec![
                COL_VARIABLE_ID,
                COL_VARIABLE_CODE,
                COL_VARIABLE_NAME,
                COL_UNITS,
            ],
            Table::DataValues => vec![
                COL_DATETIME,
                COL_SITE_ID,
                COL_VARIABLE_ID,
                COL_VALUE,
                COL_QC_ID,
            ],
        }
    }

    pub(crate) fn schema(&self) -> Schema {
        let fields = match self {
            Table::Sites => vec![
                Field::new(COL_SITE_ID.into(), DataType::Int64),
                Field::new(COL_SITE_CODE.into(), DataType::String),
                Field::new(COL_SITE_NAME.into(), DataType::String),
                Field::new(COL_SOURCE_ORG.into(), DataType::String),
                Field::new(COL_LAT.into(), DataType::Float64),
                Field::new(COL_LON.into(), DataType::Float64),
            ],
            Table::Variables => vec![
                Field::new(COL_VARIABLE_ID.into(), DataType::Int64),
                Field::new(COL_VARIABLE_CODE.into(), DataType::String),
                Field::new(COL_VARIABLE_NAME.into(), DataType::String),
                Field::new(COL_UNITS.into(), DataType::String),
            ],
            Table::DataValues => vec![
                Field::new(
                    COL_DATETIME.into(),
                    DataType::Datetime(TimeUnit::Milliseconds, None),
                ),
                Field::new(COL_SITE_ID.into(), DataType::Int64),
                Field::new(COL_VARIABLE_ID.into(), DataType::Int64),
                Field::new(COL_VALUE.into(), DataType::Float64),
                Field::new(COL_QC_ID.into(), DataType::Int64),
            ],
        };
        Schema::from_iter(fields)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The columns that jointly decide whether an incoming observation duplicates
/// a stored one. Chosen per ingestion call, not per table.
///
/// `SeriesInstant` treats a re-fetched key tuple as a duplicate even when its
/// value changed; `SeriesInstantValue` additionally keys on the value, so a
/// corrected reading for an existing instant is stored as a new row. The
/// daily-extremes path uses the stricter variant; everything else uses
/// `SeriesInstant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// (SiteID, VariableID, Datetime)
    SeriesInstant,
    /// (SiteID, VariableID, Datetime, Value)
    SeriesInstantValue,
}

impl IdentityKey {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            IdentityKey::SeriesInstant => &[COL_SITE_ID, COL_VARIABLE_ID, COL_DATETIME],
            IdentityKey::SeriesInstantValue => {
                &[COL_SITE_ID, COL_VARIABLE_ID, COL_DATETIME, COL_VALUE]
            }
        }
    }
}

/// A candidate row for one of the reference tables, addressed by its natural
/// key. Implemented by [`crate::SiteDef`] and [`crate::VariableDef`]; the
/// store's `resolve_id` works purely through this seam.
pub trait RefEntity {
    /// The reference table this entity lives in.
    const TABLE: Table;
    /// Surrogate ID column of that table.
    const ID_COLUMN: &'static str;
    /// Natural key column of that table.
    const CODE_COLUMN: &'static str;

    /// The natural key value of this candidate.
    fn natural_key(&self) -> &str;

    /// A single-row frame for insertion under the given surrogate ID.
    fn to_row(&self, id: i64) -> PolarsResult<DataFrame>;
}

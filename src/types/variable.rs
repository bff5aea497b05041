//! Candidate variable records and the catalog of codes this crate knows.

use crate::obs_data::error::ObsDataError;
use crate::store::table::{
    RefEntity, Table, COL_UNITS, COL_VARIABLE_CODE, COL_VARIABLE_ID, COL_VARIABLE_NAME,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement system requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Units {
    #[default]
    English,
    Metric,
}

impl Units {
    pub(crate) fn query_value(&self) -> &'static str {
        match self {
            Units::English => "english",
            Units::Metric => "metric",
        }
    }

    pub(crate) fn water_level_units(&self) -> &'static str {
        match self {
            Units::English => "ft",
            Units::Metric => "m",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_value())
    }
}

/// A variable as a candidate row for the `variables` table.
///
/// Wind components and tidal extremes are recorded by code only; that is a
/// legitimate partial record, and the sum type keeps the choice visible at
/// the resolver boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariableDef {
    Full {
        code: String,
        name: String,
        units: String,
    },
    Partial {
        code: String,
    },
}

impl VariableDef {
    pub fn full(
        code: impl Into<String>,
        name: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        VariableDef::Full {
            code: code.into(),
            name: name.into(),
            units: units.into(),
        }
    }

    pub fn partial(code: impl Into<String>) -> Self {
        VariableDef::Partial { code: code.into() }
    }

    pub fn code(&self) -> &str {
        match self {
            VariableDef::Full { code, .. } => code,
            VariableDef::Partial { code } => code,
        }
    }

    /// The verified hourly water level series.
    pub fn hourly_height(units: Units) -> Self {
        VariableDef::full("hourly_height", "tide level", units.water_level_units())
    }

    /// Looks up the catalog entry for a source variable code. Codes outside
    /// the catalog are a caller error and abort the ingestion call.
    pub fn for_code(code: &str, units: Units) -> Result<Self, ObsDataError> {
        match code {
            "hourly_height" => Ok(Self::hourly_height(units)),
            "s" => Ok(Self::partial("WSF6")),
            "g" => Ok(Self::partial("WGF6")),
            "d" => Ok(Self::partial("WDF6")),
            "h" => Ok(Self::partial("high_tide")),
            "l" => Ok(Self::partial("low_tide")),
            "hh" => Ok(Self::partial("high_high_tide")),
            "ll" => Ok(Self::partial("low_low_tide")),
            other => Err(ObsDataError::UnknownVariableCode(other.to_string())),
        }
    }
}

impl RefEntity for VariableDef {
    const TABLE: Table = Table::Variables;
    const ID_COLUMN: &'static str = COL_VARIABLE_ID;
    const CODE_COLUMN: &'static str = COL_VARIABLE_CODE;

    fn natural_key(&self) -> &str {
        self.code()
    }

    fn to_row(&self, id: i64) -> PolarsResult<DataFrame> {
        let (code, name, units) = match self {
            VariableDef::Full { code, name, units } => {
                (code.as_str(), Some(name.as_str()), Some(units.as_str()))
            }
            VariableDef::Partial { code } => (code.as_str(), None, None),
        };
        df!(
            COL_VARIABLE_ID => [id],
            COL_VARIABLE_CODE => [code],
            COL_VARIABLE_NAME => [name],
            COL_UNITS => [units],
        )
    }
}

/// The three components of the six-minute wind product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindField {
    Speed,
    Gust,
    Direction,
}

impl WindField {
    pub const ALL: [WindField; 3] = [WindField::Speed, WindField::Gust, WindField::Direction];

    pub fn variable(&self) -> VariableDef {
        match self {
            WindField::Speed => VariableDef::partial("WSF6"),
            WindField::Gust => VariableDef::partial("WGF6"),
            WindField::Direction => VariableDef::partial("WDF6"),
        }
    }
}

/// The four daily tidal extremes reported by the high/low product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TideExtreme {
    High,
    HighHigh,
    Low,
    LowLow,
}

impl TideExtreme {
    /// Maps a trimmed, lowercased `TY` tag. An unknown tag means the caller
    /// is feeding data this catalog does not describe; that aborts the call.
    pub fn from_tag(tag: &str) -> Result<Self, ObsDataError> {
        match tag {
            "h" => Ok(TideExtreme::High),
            "hh" => Ok(TideExtreme::HighHigh),
            "l" => Ok(TideExtreme::Low),
            "ll" => Ok(TideExtreme::LowLow),
            other => Err(ObsDataError::UnknownExtremeTag(other.to_string())),
        }
    }

    pub fn variable(&self) -> VariableDef {
        match self {
            TideExtreme::High => VariableDef::partial("high_tide"),
            TideExtreme::HighHigh => VariableDef::partial("high_high_tide"),
            TideExtreme::Low => VariableDef::partial("low_tide"),
            TideExtreme::LowLow => VariableDef::partial("low_low_tide"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_height_follows_the_unit_system() {
        match VariableDef::hourly_height(Units::English) {
            VariableDef::Full { code, name, units } => {
                assert_eq!(code, "hourly_height");
                assert_eq!(name, "tide level");
                assert_eq!(units, "ft");
            }
            VariableDef::Partial { .. } => panic!("expected a full variable"),
        }
        match VariableDef::hourly_height(Units::Metric) {
            VariableDef::Full { units, .. } => assert_eq!(units, "m"),
            VariableDef::Partial { .. } => panic!("expected a full variable"),
        }
    }

    #[test]
    fn catalog_maps_wind_and_extreme_codes() {
        assert_eq!(
            VariableDef::for_code("s", Units::English).unwrap().code(),
            "WSF6"
        );
        assert_eq!(
            VariableDef::for_code("g", Units::English).unwrap().code(),
            "WGF6"
        );
        assert_eq!(
            VariableDef::for_code("d", Units::English).unwrap().code(),
            "WDF6"
        );
        assert_eq!(
            VariableDef::for_code("hh", Units::English).unwrap().code(),
            "high_high_tide"
        );
    }

    #[test]
    fn unknown_codes_fail_fast() {
        assert!(matches!(
            VariableDef::for_code("salinity", Units::English),
            Err(ObsDataError::UnknownVariableCode(_))
        ));
        assert!(matches!(
            TideExtreme::from_tag("x"),
            Err(ObsDataError::UnknownExtremeTag(_))
        ));
    }

    #[test]
    fn extreme_tags_round_trip_to_variables() {
        assert_eq!(
            TideExtreme::from_tag("l").unwrap().variable().code(),
            "low_tide"
        );
        assert_eq!(
            TideExtreme::from_tag("ll").unwrap().variable().code(),
            "low_low_tide"
        );
    }

    #[test]
    fn partial_variable_row_has_null_name_and_units() {
        let row = VariableDef::partial("WSF6").to_row(3).unwrap();
        assert_eq!(row.column(COL_VARIABLE_NAME).unwrap().null_count(), 1);
        assert_eq!(row.column(COL_UNITS).unwrap().null_count(), 1);
        assert_eq!(
            row.column(COL_VARIABLE_ID).unwrap().i64().unwrap().get(0),
            Some(3)
        );
    }
}

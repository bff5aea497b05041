mod error;
mod obs_data;
mod store;
mod tidestore;
mod types;
mod utils;

pub use error::TidestoreError;
pub use tidestore::*;

pub use obs_data::error::ObsDataError;
pub use obs_data::fetch::{CoopsClient, Product};
pub use obs_data::parse::{ApiMessage, ProductResponse, SiteMetadata, WaterLevelObs, WindObs};

pub use store::error::StoreError;
pub use store::normalize::normalize_datetime;
pub use store::obs_store::ObsStore;
pub use store::table::{IdentityKey, RefEntity, Table};

pub use types::date_window::DateWindow;
pub use types::site::SiteDef;
pub use types::variable::{TideExtreme, Units, VariableDef, WindField};

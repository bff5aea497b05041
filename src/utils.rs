use std::path::PathBuf;

const STORE_DIR_NAME: &str = "tidestore";

pub fn default_store_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join(STORE_DIR_NAME))
}

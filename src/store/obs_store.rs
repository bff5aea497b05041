//! Parquet-backed record store for the three observation tables.
//!
//! One parquet file per table under the store directory. Reads are lazy scans
//! with predicate pushdown; appends align the batch to the table schema,
//! concatenate with the existing rows and atomically replace the file, so
//! every append is its own all-or-nothing unit.

use crate::store::dedup::left_only;
use crate::store::error::StoreError;
use crate::store::normalize::normalize_datetime;
use crate::store::table::{IdentityKey, RefEntity, Table, COL_DATETIME, COL_SITE_ID, COL_VARIABLE_ID};
use log::info;
use polars::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

pub struct ObsStore {
    dir: PathBuf,
}

impl ObsStore {
    /// Binds a store handle to `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        match fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                let err = io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "store path exists but is not a directory",
                );
                return Err(StoreError::StoreDirCreation(dir, err));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| StoreError::StoreDirCreation(dir.clone(), e))?;
            }
            Err(e) => return Err(StoreError::StoreDirCreation(dir, e)),
        }
        Ok(ObsStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: Table) -> PathBuf {
        self.dir.join(table.file_name())
    }

    /// Reads a whole table. A table that has never been written reads as an
    /// empty frame with the table schema.
    pub async fn read_table(&self, table: Table) -> Result<DataFrame, StoreError> {
        self.read_table_filtered(table, None).await
    }

    /// Reads a table restricted by a predicate, pushed down into the parquet
    /// scan. `datavalues` comes back with a normalized `Datetime` column,
    /// sorted by it.
    pub async fn read_table_filtered(
        &self,
        table: Table,
        predicate: Option<Expr>,
    ) -> Result<DataFrame, StoreError> {
        let path = self.table_path(table);
        if fs::metadata(&path).await.is_err() {
            return Ok(DataFrame::empty_with_schema(&table.schema()));
        }
        let mut frame = LazyFrame::scan_parquet(&path, Default::default())
            .map_err(|e| StoreError::ParquetScan(path.clone(), e))?;
        if let Some(predicate) = predicate {
            frame = frame.filter(predicate);
        }
        let collected = frame.collect()?;
        if table == Table::DataValues {
            return normalize_datetime(collected, COL_DATETIME);
        }
        Ok(collected)
    }

    /// Appends `batch` to `table`. Columns the batch does not carry are
    /// persisted as nulls; a column the table does not know is an error.
    /// `datavalues` batches get their `Datetime` normalized and the table is
    /// kept sorted by it.
    pub async fn append_records(&self, table: Table, batch: DataFrame) -> Result<(), StoreError> {
        let batch = if table == Table::DataValues {
            normalize_datetime(batch, COL_DATETIME)?
        } else {
            batch
        };
        let aligned = align_to_schema(table, batch)?;
        let mut combined = self.read_table(table).await?;
        combined.vstack_mut(&aligned)?;
        if table == Table::DataValues {
            combined = combined.sort([COL_DATETIME], SortMultipleOptions::default())?;
        }
        self.write_table(table, combined).await
    }

    /// Appends only the rows of `batch` not already present in `table` by
    /// key-equality on the identity columns, and hands the original batch
    /// back for further chaining.
    ///
    /// `site_scope` narrows the existing-row read to one site when the table
    /// is `datavalues`; that bounds the comparison cost but never changes the
    /// outcome, because a batch is always tagged with a single `SiteID`.
    pub async fn append_unique(
        &self,
        table: Table,
        batch: DataFrame,
        key: IdentityKey,
        site_scope: Option<i64>,
    ) -> Result<DataFrame, StoreError> {
        let scope = match (table, site_scope) {
            (Table::DataValues, Some(site_id)) => Some(col(COL_SITE_ID).eq(lit(site_id))),
            _ => None,
        };
        let existing = self.read_table_filtered(table, scope).await?;
        if existing.is_empty() {
            info!(
                "{}: table empty, appending all {} batch rows",
                table,
                batch.height()
            );
            self.append_records(table, batch.clone()).await?;
            return Ok(batch);
        }
        let fresh = left_only(&batch, &existing, key.columns())?;
        info!(
            "{}: {} of {} batch rows are new",
            table,
            fresh.height(),
            batch.height()
        );
        if !fresh.is_empty() {
            self.append_records(table, fresh).await?;
        }
        Ok(batch)
    }

    /// Returns the surrogate ID for `entity`, inserting it first when no row
    /// with its natural key exists yet.
    ///
    /// For a fixed code this returns the same ID on every call, across
    /// process restarts, as long as nothing else mutates the store
    /// concurrently. If the row cannot be found even after the insert, the
    /// write was lost and the call fails with [`StoreError::LookupFailure`];
    /// there is no retry.
    pub async fn resolve_id<E: RefEntity>(&self, entity: &E) -> Result<i64, StoreError> {
        let code = entity.natural_key();
        let existing = self.read_table(E::TABLE).await?;
        if let Some(id) = lookup_code(&existing, E::ID_COLUMN, E::CODE_COLUMN, code)? {
            return Ok(id);
        }
        let next_id = existing.column(E::ID_COLUMN)?.i64()?.max().unwrap_or(0) + 1;
        let row = entity.to_row(next_id)?;
        self.append_records(E::TABLE, row).await?;
        let table = self.read_table(E::TABLE).await?;
        lookup_code(&table, E::ID_COLUMN, E::CODE_COLUMN, code)?.ok_or_else(|| {
            StoreError::LookupFailure {
                table: E::TABLE.name(),
                code: code.to_string(),
            }
        })
    }

    /// All stored observations of one variable, optionally restricted to one
    /// site, ordered by `Datetime`.
    pub async fn series_for_variable(
        &self,
        variable_id: i64,
        site_id: Option<i64>,
    ) -> Result<DataFrame, StoreError> {
        let mut predicate = col(COL_VARIABLE_ID).eq(lit(variable_id));
        if let Some(site_id) = site_id {
            predicate = predicate.and(col(COL_SITE_ID).eq(lit(site_id)));
        }
        self.read_table_filtered(Table::DataValues, Some(predicate))
            .await
    }

    async fn write_table(&self, table: Table, mut frame: DataFrame) -> Result<(), StoreError> {
        let path = self.table_path(table);
        let dir = self.dir.clone();
        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new_in(&dir)
                .map_err(|e| StoreError::ParquetWriteIo(path.clone(), e))?;
            ParquetWriter::new(temp_file.as_file_mut())
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut frame)
                .map_err(|e| StoreError::ParquetWritePolars(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| StoreError::PersistTempFile(path.clone(), e.error))?;
            Ok::<(), StoreError>(())
        })
        .await??;
        Ok(())
    }
}

fn align_to_schema(table: Table, batch: DataFrame) -> Result<DataFrame, StoreError> {
    let schema = table.schema();
    for name in batch.get_column_names() {
        if schema.get(name.as_str()).is_none() {
            return Err(StoreError::UnknownColumn {
                table: table.name(),
                column: name.to_string(),
            });
        }
    }
    let height = batch.height();
    let mut columns = Vec::with_capacity(schema.len());
    for (name, dtype) in schema.iter() {
        let column = match batch.column(name.as_str()) {
            Ok(present) => present.cast(dtype)?,
            Err(_) => Series::full_null(name.clone(), height, dtype).into_column(),
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}

fn lookup_code(
    frame: &DataFrame,
    id_column: &str,
    code_column: &str,
    code: &str,
) -> Result<Option<i64>, StoreError> {
    let matched = frame
        .clone()
        .lazy()
        .filter(col(code_column).eq(lit(code.to_string())))
        .collect()?;
    if matched.is_empty() {
        return Ok(None);
    }
    Ok(matched.column(id_column)?.i64()?.get(0))
}

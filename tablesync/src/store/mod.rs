//! SQLite-backed table store.
//!
//! Rows are read back as records through `json_object`, and upserts only
//! touch the columns present in the record.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{Row, SqlitePool};

use crate::api::{MappingSource, TableStore};
use crate::config::repository::mappings;
use crate::sync::{CellValue, ColumnKind, Record, TableSpec};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// [`TableStore`] over a SQLite pool
pub struct SqliteStore {
    pool: SqlitePool,
    /// Column kinds per table, known once `ensure_table` has run
    kinds: RwLock<HashMap<String, HashMap<String, ColumnKind>>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            kinds: RwLock::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the table for `spec` if needed and add any missing columns
    pub async fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        spec.validate().map_err(|e| anyhow!("Invalid table '{}': {}", spec.name, e))?;

        let mut columns = vec![format!("{} TEXT PRIMARY KEY", quote_ident(&spec.key_field))];
        for column in spec.columns.iter().filter(|c| c.field != spec.key_field) {
            columns.push(quote_ident(&column.field));
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&spec.name),
            columns.join(", ")
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table '{}'", spec.name))?;

        let existing: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(&spec.name)))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read columns of '{}'", spec.name))?
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<std::result::Result<_, _>>()?;

        for column in &spec.columns {
            if existing.iter().any(|c| *c == column.field) {
                continue;
            }
            log::info!("Adding column '{}' to '{}'", column.field, spec.name);
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(&spec.name),
                quote_ident(&column.field)
            );
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to add column '{}' to '{}'", column.field, spec.name))?;
        }

        let kinds = spec
            .columns
            .iter()
            .map(|c| (c.field.clone(), c.kind))
            .collect();
        self.kinds
            .write()
            .map_err(|_| anyhow!("column registry poisoned"))?
            .insert(spec.name.clone(), kinds);

        Ok(())
    }

    /// Column kinds of a prepared table
    fn column_kinds(&self, table: &str) -> Result<HashMap<String, ColumnKind>> {
        let kinds = self.kinds.read().map_err(|_| anyhow!("column registry poisoned"))?;
        kinds
            .get(table)
            .cloned()
            .ok_or_else(|| anyhow!("Table '{}' has not been prepared", table))
    }

    /// `json_object('a', "a", ...)` over every known column
    fn row_json_sql(&self, table: &str) -> Result<(String, HashMap<String, ColumnKind>)> {
        let kinds = self.column_kinds(table)?;
        let mut fields: Vec<&String> = kinds.keys().collect();
        fields.sort();
        let pairs: Vec<String> = fields
            .iter()
            .map(|f| format!("{}, {}", quote_literal(f), quote_ident(f)))
            .collect();
        Ok((format!("json_object({})", pairs.join(", ")), kinds))
    }

    /// All rows of a table, ordered by key
    #[cfg(test)]
    async fn fetch_all(&self, table: &str, key_field: &str) -> Result<Vec<Record>> {
        let (json, kinds) = self.row_json_sql(table)?;
        let sql = format!(
            "SELECT {} AS record_json FROM {} ORDER BY {}",
            json,
            quote_ident(table),
            quote_ident(key_field)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read '{}'", table))?;

        rows.iter().map(|row| decode_row(row, &kinds)).collect()
    }

    async fn execute_upsert<'e, E>(executor: E, table: &str, record: &Record, conflict_key: &str) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let sql = upsert_sql(table, record, conflict_key)?;
        let mut query = sqlx::query(&sql);
        for value in record.values() {
            query = bind_value(query, value);
        }
        query
            .execute(executor)
            .await
            .with_context(|| format!("Failed to upsert into '{}'", table))?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn get_by_keys(&self, table: &str, key_field: &str, keys: &[String]) -> Result<Vec<Record>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let (json, kinds) = self.row_json_sql(table)?;
        let sql = format!(
            "SELECT {} AS record_json FROM {} WHERE {} IN ({})",
            json,
            quote_ident(table),
            quote_ident(key_field),
            placeholders(keys.len())
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key.clone());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read {} keys from '{}'", keys.len(), table))?;

        rows.iter().map(|row| decode_row(row, &kinds)).collect()
    }

    async fn get_keys_page(
        &self,
        table: &str,
        key_field: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT {key} FROM {table} WHERE {key} IS NOT NULL ORDER BY {key} LIMIT ? OFFSET ?",
            key = quote_ident(key_field),
            table = quote_ident(table)
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to page keys of '{}'", table))?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    async fn upsert(&self, table: &str, record: &Record, conflict_key: &str) -> Result<()> {
        Self::execute_upsert(&self.pool, table, record, conflict_key).await
    }

    async fn upsert_many(&self, table: &str, records: &[Record], conflict_key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for record in records {
            Self::execute_upsert(&mut *tx, table, record, conflict_key).await?;
        }
        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    async fn delete_by_keys(&self, table: &str, key_field: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            quote_ident(table),
            quote_ident(key_field),
            placeholders(keys.len())
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key.clone());
        }
        let result = query
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete {} keys from '{}'", keys.len(), table))?;

        log::debug!("Deleted {} rows from '{}'", result.rows_affected(), table);
        Ok(())
    }
}

#[async_trait]
impl MappingSource for SqliteStore {
    async fn column_mappings(&self, table: &str) -> Result<Vec<(String, String)>> {
        Ok(mappings::get_column_mappings(&self.pool, table)
            .await?
            .into_iter()
            .map(|m| (m.header_label, m.field_name))
            .collect())
    }
}

fn upsert_sql(table: &str, record: &Record, conflict_key: &str) -> Result<String> {
    if !record.contains_key(conflict_key) {
        bail!("record for '{}' has no '{}'", table, conflict_key);
    }
    let columns: Vec<String> = record.keys().map(|f| quote_ident(f)).collect();
    let updates: Vec<String> = record
        .keys()
        .filter(|f| f.as_str() != conflict_key)
        .map(|f| format!("{col} = excluded.{col}", col = quote_ident(f)))
        .collect();

    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
        quote_ident(table),
        columns.join(", "),
        placeholders(record.len()),
        quote_ident(conflict_key),
        on_conflict
    ))
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &CellValue) -> SqliteQuery<'q> {
    match value.normalized() {
        CellValue::Null => query.bind(None::<String>),
        CellValue::Bool(b) => query.bind(b),
        CellValue::Number(n) => query.bind(n),
        CellValue::String(s) => query.bind(s),
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow, kinds: &HashMap<String, ColumnKind>) -> Result<Record> {
    let json: String = row.try_get("record_json")?;
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&json).context("Failed to decode row")?;

    Ok(object
        .iter()
        .map(|(field, value)| {
            let value = CellValue::from_json(value);
            let value = match (kinds.get(field), &value) {
                // SQLite has no boolean type
                (Some(ColumnKind::Bool), CellValue::Number(n)) => CellValue::Bool(*n != 0.0),
                _ => value,
            };
            (field.clone(), value)
        })
        .collect())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

//! Column mapping repository
//!
//! Persisted `header label -> field` pairs per table. These form the lowest
//! layer of the merged mapping; built-in defaults and per-run overrides are
//! applied on top.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::sync::normalize_header;

/// A stored mapping row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMapping {
    pub header_label: String,
    pub field_name: String,
    pub position: i64,
}

/// Get all column mappings for a table, in edit order
pub async fn get_column_mappings(pool: &SqlitePool, table: &str) -> Result<Vec<StoredMapping>> {
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT header_label, field_name, position FROM column_mappings
         WHERE table_name = ?
         ORDER BY position, id",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .context("Failed to get column mappings")?;

    Ok(rows
        .into_iter()
        .map(|(header_label, field_name, position)| StoredMapping {
            header_label,
            field_name,
            position,
        })
        .collect())
}

/// Set a column mapping.
///
/// A new header is appended after the existing ones; an existing header
/// keeps its position and is pointed at the new field.
pub async fn set_column_mapping(pool: &SqlitePool, table: &str, header: &str, field: &str) -> Result<()> {
    let header = normalize_header(header);

    sqlx::query(
        "INSERT INTO column_mappings (table_name, header_label, field_name, position)
         VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM column_mappings WHERE table_name = ?))
         ON CONFLICT(table_name, header_label)
         DO UPDATE SET field_name = excluded.field_name",
    )
    .bind(table)
    .bind(&header)
    .bind(field)
    .bind(table)
    .execute(pool)
    .await
    .context("Failed to set column mapping")?;

    Ok(())
}

/// Delete the mapping for one header. Returns false if none existed.
pub async fn delete_column_mapping(pool: &SqlitePool, table: &str, header: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM column_mappings WHERE table_name = ? AND header_label = ?")
        .bind(table)
        .bind(normalize_header(header))
        .execute(pool)
        .await
        .context("Failed to delete column mapping")?;

    Ok(result.rows_affected() > 0)
}

/// Delete every mapping for a table
pub async fn clear_column_mappings(pool: &SqlitePool, table: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM column_mappings WHERE table_name = ?")
        .bind(table)
        .execute(pool)
        .await
        .context("Failed to clear column mappings")?;

    Ok(result.rows_affected())
}

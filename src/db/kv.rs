use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::ServerError;

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>, ServerError> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| ServerError::DbError(format!("kv get failed: {e}")))
}

pub fn set(conn: &Connection, key: &str, value: &str, now: i64) -> Result<(), ServerError> {
    conn.execute(
        r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
        params![key, value, now],
    )
    .map_err(|e| ServerError::DbError(format!("kv set failed: {e}")))?;
    Ok(())
}

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::db::Database;

pub(crate) fn upsert_preference(conn: &Connection, key: &str, value: &Value) -> Result<()> {
    if value.is_array() || value.is_object() {
        return Err(anyhow!("preference '{key}' must be a primitive value"));
    }

    conn.execute(
        "INSERT INTO preferences (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        params![key, value.to_string(), Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("failed to write preference '{key}'"))?;
    Ok(())
}

fn decode(key: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("preference '{key}' holds invalid JSON"))
}

impl Database {
    pub async fn get_preference(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM preferences WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|raw| decode(&key, &raw)).transpose()
        })
        .await
    }

    pub async fn set_preference(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| upsert_preference(conn, &key, &value))
            .await
    }

    pub async fn remove_preference(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    /// All stored preferences ordered by key.
    pub async fn preferences(&self) -> Result<Vec<(String, Value)>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM preferences ORDER BY key")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(key, raw)| {
                    let value = decode(&key, &raw)?;
                    Ok((key, value))
                })
                .collect()
        })
        .await
    }
}

/// PostgreSQL-backed `StateStore`.
///
/// One row per object in `pegel_state.objects`; definitions and values are
/// stored as JSON text. Prefix matching uses `left()` rather than `LIKE`
/// because sanitized station names contain `_`.

use chrono::Utc;
use postgres::Client;

use super::{check_writable, ObjectKind, ObjectSpec, StateStore, StateValue, StoreError};
use crate::db::{self, DbConfigError, STATE_SCHEMA};

pub struct PgStore {
    client: Client,
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects via DATABASE_URL and checks the state schema is usable.
    pub fn connect() -> Result<Self, DbConfigError> {
        let client = db::connect_and_verify(&[STATE_SCHEMA])?;
        Ok(Self::new(client))
    }

    fn load_spec(&mut self, path: &str) -> Result<Option<ObjectSpec>, StoreError> {
        let rows = self.client.query(
            "SELECT spec FROM pegel_state.objects WHERE path = $1",
            &[&path],
        )?;
        match rows.first() {
            Some(row) => {
                let spec: String = row.get(0);
                Ok(Some(serde_json::from_str(&spec)?))
            }
            None => Ok(None),
        }
    }
}

impl StateStore for PgStore {
    fn ensure_exists(&mut self, path: &str, spec: &ObjectSpec) -> Result<bool, StoreError> {
        let spec_json = serde_json::to_string(spec)?;
        let inserted = self.client.execute(
            "INSERT INTO pegel_state.objects (path, kind, spec)
             VALUES ($1, $2, $3)
             ON CONFLICT (path) DO NOTHING",
            &[&path, &spec.kind().as_str(), &spec_json],
        )?;
        Ok(inserted == 1)
    }

    fn write(&mut self, path: &str, value: StateValue) -> Result<(), StoreError> {
        let spec = self
            .load_spec(path)?
            .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;
        check_writable(path, &spec, &value)?;

        let value_json = serde_json::to_string(&value)?;
        self.client.execute(
            "UPDATE pegel_state.objects SET value = $2, updated_at = $3 WHERE path = $1",
            &[&path, &value_json, &Utc::now()],
        )?;
        Ok(())
    }

    fn read(&mut self, path: &str) -> Result<Option<StateValue>, StoreError> {
        let rows = self.client.query(
            "SELECT value FROM pegel_state.objects WHERE path = $1",
            &[&path],
        )?;
        let raw: Option<String> = rows.first().and_then(|row| row.get(0));
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn delete(&mut self, path: &str, recursive: bool) -> Result<usize, StoreError> {
        let removed = if recursive {
            let child_prefix = format!("{}.", path);
            self.client.execute(
                "DELETE FROM pegel_state.objects
                 WHERE path = $1 OR left(path, char_length($2)) = $2",
                &[&path, &child_prefix],
            )?
        } else {
            self.client.execute(
                "DELETE FROM pegel_state.objects WHERE path = $1",
                &[&path],
            )?
        };
        Ok(removed as usize)
    }

    fn list_where(&mut self, prefix: &str, kind: ObjectKind) -> Result<Vec<String>, StoreError> {
        let child_prefix = format!("{}.", prefix);
        let rows = self.client.query(
            "SELECT path FROM pegel_state.objects
             WHERE kind = $1 AND left(path, char_length($2)) = $2
             ORDER BY path COLLATE \"C\"",
            &[&kind.as_str(), &child_prefix],
        )?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}

/// PostgreSQL access for the state store.
///
/// Reads `DATABASE_URL` (a `.env` file is honoured), connects, and checks
/// that the `pegel_state` schema is present and usable before any cycle
/// touches it. Errors carry the shell command that fixes them.

use postgres::{Client, NoTls};
use std::env;
use thiserror::Error;

/// Schema holding the state tree (see sql/001_adapter_state.sql).
pub const STATE_SCHEMA: &str = "pegel_state";

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("DATABASE_URL is not set; add it to .env or run with --dry-run")]
    MissingDatabaseUrl,
    #[error("DATABASE_URL '{0}' is not a postgres:// or postgresql:// URL")]
    InvalidDatabaseUrl(String),
    #[error("cannot reach PostgreSQL: {0}")]
    ConnectionFailed(#[from] postgres::Error),
    #[error("schema '{0}' is missing; apply it with: psql \"$DATABASE_URL\" -f sql/001_adapter_state.sql")]
    MissingSchema(String),
    #[error("no USAGE privilege on schema '{0}'; grant it with: GRANT USAGE ON SCHEMA {0} TO <role>")]
    PermissionDenied(String),
}

pub fn database_url_looks_valid(url: &str) -> bool {
    url.starts_with("postgresql://") || url.starts_with("postgres://")
}

/// Opens a client from `DATABASE_URL`.
pub fn connect_with_validation() -> Result<Client, DbConfigError> {
    dotenv::dotenv().ok();

    let url = env::var("DATABASE_URL").map_err(|_| DbConfigError::MissingDatabaseUrl)?;
    if !database_url_looks_valid(&url) {
        return Err(DbConfigError::InvalidDatabaseUrl(url));
    }

    Ok(Client::connect(&url, NoTls)?)
}

/// Fails unless `schema` exists and the current role may use it.
pub fn verify_schema(client: &mut Client, schema: &str) -> Result<(), DbConfigError> {
    let exists: bool = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
            &[&schema],
        )?
        .get(0);
    if !exists {
        return Err(DbConfigError::MissingSchema(schema.to_string()));
    }

    let usable: bool = client
        .query_one("SELECT has_schema_privilege(current_user, $1, 'USAGE')", &[&schema])?
        .get(0);
    if !usable {
        return Err(DbConfigError::PermissionDenied(schema.to_string()));
    }

    Ok(())
}

pub fn connect_and_verify(schemas: &[&str]) -> Result<Client, DbConfigError> {
    let mut client = connect_with_validation()?;
    for schema in schemas {
        verify_schema(&mut client, schema)?;
    }
    Ok(client)
}

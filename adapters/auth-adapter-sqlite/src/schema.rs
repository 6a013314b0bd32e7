//! Database schema initialization

use sqlx::{Sqlite, SqlitePool, Transaction};

/// Get the current database version from vars table
async fn get_db_version(tx: &mut Transaction<'_, Sqlite>) -> i64 {
	sqlx::query_scalar::<_, String>("SELECT value FROM vars WHERE key = 'db_version'")
		.fetch_optional(&mut **tx)
		.await
		.ok()
		.flatten()
		.and_then(|v| v.parse().ok())
		.unwrap_or(0)
}

async fn set_db_version(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<(), sqlx::Error> {
	sqlx::query("INSERT OR REPLACE INTO vars (key, value) VALUES ('db_version', ?)")
		.bind(version.to_string())
		.execute(&mut **tx)
		.await?;
	Ok(())
}

const CURRENT_DB_VERSION: i64 = 1;

/// Creates the schema if missing
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS vars (
		key text NOT NULL,
		value text NOT NULL,
		created_at INTEGER DEFAULT (unixepoch()),
		updated_at INTEGER DEFAULT (unixepoch()),
		PRIMARY KEY(key)
	)",
	)
	.execute(&mut *tx)
	.await?;

	let version = get_db_version(&mut tx).await;

	// Users
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS users (
			user_id integer PRIMARY KEY AUTOINCREMENT,
			username text NOT NULL,
			lname text NOT NULL,
			email text NOT NULL,
			password text NOT NULL,
			scope text NOT NULL DEFAULT '',
			last_login INTEGER,
			created_at INTEGER DEFAULT (unixepoch())
		)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_lname ON users (lname)")
		.execute(&mut *tx)
		.await?;
	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email)")
		.execute(&mut *tx)
		.await?;

	// Sessions
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS sessions (
			user_id integer NOT NULL,
			session_id integer NOT NULL,
			created_at INTEGER DEFAULT (unixepoch()),
			expires_at INTEGER NOT NULL,
			last_used INTEGER,
			PRIMARY KEY(user_id, session_id),
			FOREIGN KEY(user_id) REFERENCES users(user_id) ON DELETE CASCADE
		)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions (expires_at)")
		.execute(&mut *tx)
		.await?;

	if version < CURRENT_DB_VERSION {
		set_db_version(&mut tx, CURRENT_DB_VERSION).await?;
	}

	tx.commit().await?;
	Ok(())
}

// vim: ts=4

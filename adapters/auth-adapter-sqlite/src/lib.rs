//! SQLite-backed user and session storage

use async_trait::async_trait;
use sqlx::{
	Row,
	sqlite::{self, SqlitePool},
};
use std::path::Path;

use gatekeep_types::auth_adapter::{
	AuthAdapter, CreateUserData, SecurityInfo, SessionId, UserExists, UserId,
};
use gatekeep_types::prelude::*;

mod schema;
mod utils;

use utils::*;

/// Database file inside the storage directory
pub const DB_FILE: &str = "auth.db";

#[derive(Debug)]
pub struct AuthAdapterSqlite {
	db: SqlitePool,
}

impl AuthAdapterSqlite {
	/// Opens (creating if needed) `<dir>/auth.db`
	pub async fn new(dir: impl AsRef<Path>) -> GkResult<Self> {
		let dir = dir.as_ref();
		tokio::fs::create_dir_all(dir).await?;

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(dir.join(DB_FILE))
			.create_if_missing(true)
			.foreign_keys(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.map_err(db_err)?;

		schema::init_db(&db).await.map_err(db_err)?;
		info!("auth db opened: {}", dir.join(DB_FILE).display());

		Ok(Self { db })
	}
}

#[async_trait]
impl AuthAdapter for AuthAdapterSqlite {
	async fn read_security_info(&self, lname: &str) -> GkResult<SecurityInfo> {
		let res = sqlx::query("SELECT user_id, username, password, scope FROM users WHERE lname = ?1")
			.bind(lname)
			.fetch_one(&self.db)
			.await;

		map_res(res, |row| {
			Ok(SecurityInfo {
				user_id: UserId(row.try_get("user_id")?),
				username: row.try_get::<String, _>("username")?.into(),
				password: row.try_get::<String, _>("password")?.into(),
				scope: parse_str_list(row.try_get("scope")?),
			})
		})
	}

	async fn read_session_scope(
		&self,
		user_id: UserId,
		username: &str,
		session_id: SessionId,
	) -> GkResult<Box<[Box<str>]>> {
		let res = sqlx::query(
			"SELECT u.scope FROM sessions s JOIN users u ON u.user_id = s.user_id
			WHERE s.user_id = ?1 AND s.session_id = ?2 AND u.username = ?3 AND s.expires_at > unixepoch()",
		)
		.bind(user_id.0)
		.bind(session_id.0)
		.bind(username)
		.fetch_one(&self.db)
		.await;

		map_res(res, |row| Ok(parse_str_list(row.try_get("scope")?)))
	}

	async fn create_session(
		&self,
		user_id: UserId,
		session_id: SessionId,
		expires_at: Timestamp,
	) -> GkResult<()> {
		let mut tx = self.db.begin().await.map_err(db_err)?;

		sqlx::query(
			"INSERT INTO sessions (user_id, session_id, expires_at, last_used) VALUES (?1, ?2, ?3, unixepoch())",
		)
		.bind(user_id.0)
		.bind(session_id.0)
		.bind(expires_at.0)
		.execute(&mut *tx)
		.await
		.map_err(db_err)?;

		sqlx::query("UPDATE users SET last_login = unixepoch() WHERE user_id = ?1")
			.bind(user_id.0)
			.execute(&mut *tx)
			.await
			.map_err(db_err)?;

		tx.commit().await.map_err(db_err)
	}

	async fn update_session_last_used(&self, user_id: UserId, session_id: SessionId) -> GkResult<()> {
		let res = sqlx::query("UPDATE sessions SET last_used = unixepoch() WHERE user_id = ?1 AND session_id = ?2")
			.bind(user_id.0)
			.bind(session_id.0)
			.execute(&self.db)
			.await
			.map_err(db_err)?;

		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	async fn delete_session(&self, user_id: UserId, session_id: SessionId) -> GkResult<()> {
		sqlx::query("DELETE FROM sessions WHERE user_id = ?1 AND session_id = ?2")
			.bind(user_id.0)
			.bind(session_id.0)
			.execute(&self.db)
			.await
			.map_err(db_err)?;
		Ok(())
	}

	async fn purge_expired_sessions(&self) -> GkResult<u64> {
		let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= unixepoch()")
			.execute(&self.db)
			.await
			.map_err(db_err)?;
		Ok(res.rows_affected())
	}

	async fn check_user_exists(&self, lname: &str, email: &str) -> GkResult<UserExists> {
		let res = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM users WHERE lname = ?1) AS name_taken,
			EXISTS(SELECT 1 FROM users WHERE email = ?2) AS email_taken",
		)
		.bind(lname)
		.bind(email)
		.fetch_one(&self.db)
		.await;

		map_res(res, |row| {
			Ok(UserExists { name_taken: row.try_get("name_taken")?, email_taken: row.try_get("email_taken")? })
		})
	}

	async fn create_user(&self, data: CreateUserData<'_>) -> GkResult<UserId> {
		let res = sqlx::query(
			"INSERT INTO users (username, lname, email, password, scope) VALUES (?1, ?2, ?3, ?4, ?5)
			RETURNING user_id",
		)
		.bind(data.username)
		.bind(data.username.to_lowercase())
		.bind(data.email)
		.bind(data.password)
		.bind(join_str_list(data.scope))
		.fetch_one(&self.db)
		.await;

		match res {
			Ok(row) => row.try_get("user_id").map(UserId).map_err(db_err),
			Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
				Err(Error::ValidationError("user already exists".into()))
			}
			Err(err) => Err(db_err(err)),
		}
	}
}

// vim: ts=4

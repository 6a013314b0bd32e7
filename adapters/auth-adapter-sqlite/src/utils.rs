//! Utility functions for database operations

use sqlx::sqlite::SqliteRow;

use gatekeep_types::prelude::*;

/// Parse a comma-separated string into a boxed array of boxed strings
pub(crate) fn parse_str_list(s: &str) -> Box<[Box<str>]> {
	s.split(',')
		.map(|s| s.trim().to_owned().into_boxed_str())
		.filter(|s| !s.is_empty())
		.collect::<Vec<_>>()
		.into_boxed_slice()
}

pub(crate) fn join_str_list(list: &[&str]) -> String {
	list.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(",")
}

/// Log database errors
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

pub(crate) fn db_err(err: sqlx::Error) -> Error {
	inspect(&err);
	Error::DbError
}

/// Map a query result to a value using a closure
pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> GkResult<T>
where
	F: FnOnce(&SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(ref row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => Err(db_err(err)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_str_list() {
		let expected: Vec<Box<str>> = vec!["user".into(), "admin".into()];
		assert_eq!(parse_str_list("user, admin,,").into_vec(), expected);
		assert!(parse_str_list("").is_empty());
		assert_eq!(join_str_list(&["user", " admin ", ""]), "user,admin");
	}
}

// vim: ts=4

use std::process::ExitCode;

use gatekeep::Config;
use gatekeep::app;
use gatekeep_types::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
	app::init_tracing();

	let path = Config::path_from_env();
	let config = match Config::load(&path).await {
		Ok(config) => config,
		Err(err) => {
			error!("FATAL: {}", err);
			return ExitCode::FAILURE;
		}
	};

	match app::run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("FATAL: {}", err);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4

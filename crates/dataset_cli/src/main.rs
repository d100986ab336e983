//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `dataset_core` linkage with a deterministic probe.
//! - Optionally list one owner's datasets from a database file.
//!
//! Usage: `dataset_cli [<db-path> list <owner-uuid>]`

use dataset_core::{open_db, DatasetRepository, SqliteDatasetRepository, StoreConfig};
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    println!("dataset_core ping={}", dataset_core::ping());
    println!("dataset_core version={}", dataset_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => ExitCode::SUCCESS,
        [path, command, owner] if command == "list" => match list_owned(path, owner) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("error: {message}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: dataset_cli [<db-path> list <owner-uuid>]");
            ExitCode::from(2)
        }
    }
}

fn list_owned(path: &str, owner: &str) -> Result<(), String> {
    let owner = Uuid::parse_str(owner).map_err(|err| format!("invalid owner id: {err}"))?;
    let mut config = StoreConfig::new(path);
    config.pool_size = 1;

    let db = open_db(&config).map_err(|err| err.to_string())?;
    let repo = SqliteDatasetRepository::new(&db);
    let datasets = repo.list_all_for_uid(owner).map_err(|err| err.to_string())?;

    for dataset in &datasets {
        println!(
            "{} family={} schema={} valid={}",
            dataset.id,
            dataset.family(),
            dataset.schema(),
            dataset.valid()
        );
    }
    println!("count={}", datasets.len());
    Ok(())
}

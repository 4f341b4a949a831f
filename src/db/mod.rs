//! Disposable test databases.
//!
//! - [setup_local_test_postgres]: a postgres container started with docker
//! - [local_test_sqlite]: a fresh SQLite file next to the working directory
//! - [clone::clone_db]: copies a capped slice of rows between two databases

pub mod clone;

pub use clone::{clone_db, CloneReport, Dialect, TableCopy};

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::PostgresConfig;
use crate::error::{CiError, Result};
use crate::process::{Cmd, CommandRunner};
use crate::ui;

/// Postgres password used by every test container.
pub const TEST_PASSWORD: &str = "pwd";

pub fn test_postgres_url(name: &str) -> String {
    format!("postgresql://postgres:{}@0.0.0.0:5432/{}", TEST_PASSWORD, name)
}

pub fn docker_run_command(name: &str, image: &str, version: Option<&str>) -> Cmd {
    let image = match version {
        Some(version) => format!("{}:{}", image, version),
        None => image.to_string(),
    };
    Cmd::new("docker").args([
        "run".to_string(),
        "--name".to_string(),
        name.to_string(),
        "-e".to_string(),
        format!("POSTGRES_PASSWORD={}", TEST_PASSWORD),
        "-e".to_string(),
        format!("POSTGRES_DB={}", name),
        "-d".to_string(),
        "-p".to_string(),
        "5432:5432".to_string(),
        image,
    ])
}

/// Starts a postgres container and returns its connection string.
///
/// `name` is both the container name and the database name; the server
/// gets two seconds to come up.
pub fn setup_local_test_postgres(
    runner: &dyn CommandRunner,
    config: &PostgresConfig,
    name: Option<&str>,
    version: Option<&str>,
) -> Result<String> {
    let name = name.unwrap_or(&config.name);
    let cmd = docker_run_command(name, &config.image, version);
    ui::display_command(&cmd);

    runner.run(&cmd).map_err(|e| {
        CiError::database(format!(
            "Failed to set up postgres test instance ({}). Try running\ndocker stop {} && docker rm {}",
            e, name, name
        ))
    })?;

    let url = test_postgres_url(name);
    ui::display_success(&format!(
        "created Postgres test instance: '{}' -- it runs in docker container '{}'",
        url, name
    ));
    thread::sleep(Duration::from_secs(2));
    Ok(url)
}

/// A test copy location for a local SQLite file.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSqlite {
    pub dir: PathBuf,
    pub file: PathBuf,
    pub url: String,
}

/// Prepares `<cwd>/<stem>_test/<stem>_test<suffix>` for `src_file`.
///
/// The directory is created and a stale test file is removed.
pub fn local_test_sqlite(src_file: &Path, cwd: &Path) -> Result<TestSqlite> {
    let stem = src_file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CiError::database(format!("Cannot read file stem of {}", src_file.display())))?;
    let new_stem = format!("{}_test", stem);
    let file_name = match src_file.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", new_stem, ext),
        None => new_stem.clone(),
    };

    let dir = cwd.join(&new_stem);
    let file = dir.join(file_name);
    fs::create_dir_all(&dir)?;
    if file.exists() {
        fs::remove_file(&file)?;
    }

    Ok(TestSqlite {
        url: format!("sqlite:///{}", file.display()),
        dir,
        file,
    })
}

//! Unit tests for the config module

use crate::{ConfigLoader, ServerConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = ServerConfig::default();
    assert_eq!(config.max_clients, 20);
    assert_eq!(config.max_jobs, 32);
    assert_eq!(config.buffer_capacity, 4096);
}

#[test]
fn test_job_executable_joins_jobs_dir() {
    let config = ServerConfig {
        jobs_dir: "/srv/jobs".into(),
        ..ServerConfig::default()
    };
    assert_eq!(
        config.job_executable("echo"),
        std::path::PathBuf::from("/srv/jobs/echo")
    );
}

#[test]
fn test_overrides_win() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::new()
        .ignore_env()
        .port(0)
        .max_jobs(2)
        .max_clients(3)
        .jobs_dir(dir.path().to_path_buf())
        .load()
        .unwrap();
    assert_eq!(config.port, 0);
    assert_eq!(config.max_jobs, 2);
    assert_eq!(config.max_clients, 3);
    assert_eq!(config.jobs_dir, dir.path());
}

#[test]
fn test_file_is_partial() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("jobd.json");
    let json = format!(
        r#"{{"max_jobs": 4, "jobs_dir": {}}}"#,
        serde_json::to_string(dir.path()).unwrap()
    );
    fs::write(&file, json).unwrap();

    let config = ConfigLoader::new().ignore_env().file(file).load().unwrap();
    assert_eq!(config.max_jobs, 4);
    assert_eq!(config.max_clients, 20);
}

#[test]
fn test_file_rejects_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("jobd.json");
    fs::write(&file, r#"{"max_jobz": 4}"#).unwrap();

    let err = ConfigLoader::new().ignore_env().file(file).load().unwrap_err();
    assert!(err.to_string().contains("failed to parse"));
}

#[test]
fn test_validation() {
    let dir = TempDir::new().unwrap();
    let loader = || ConfigLoader::new().ignore_env().jobs_dir(dir.path().to_path_buf());

    assert!(loader().max_jobs(0).load().is_err());
    assert!(loader().max_clients(0).load().is_err());
    assert!(loader().buffer_capacity(8).load().is_err());
    assert!(loader().buffer_capacity(16).load().is_ok());

    let missing = ConfigLoader::new()
        .ignore_env()
        .jobs_dir(dir.path().join("nope"))
        .load()
        .unwrap_err();
    assert!(missing.to_string().contains("not accessible"));
}

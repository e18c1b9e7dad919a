//! Layered configuration: defaults, TOML file, environment, CLI flags.

use clap::Parser;
use lookalike::cli::{Cli, Commands};
use lookalike::config::{Config, ConfigError};
use lookalike::hashing::HashAlgorithm;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all LOOKALIKE_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("LOOKALIKE_") {
            std::env::remove_var(key);
        }
    }
}

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    let guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_env();
    guard
}

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lookalike.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_toml_overrides_defaults() {
    let _guard = lock_env();
    let (_dir, path) = write_config(
        r#"
algorithm = "dhash"
hash_size = 8
threshold = 85.5
size_filter = false
batch_size = 64
cache_path = "/tmp/lookalike-test.sqlite3"
ignore_patterns = ["*.tmp", "raw/"]
"#,
    );

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.algorithm, HashAlgorithm::Difference);
    assert_eq!(config.hash_size, 8);
    assert_eq!(config.threshold, 85.5);
    assert!(!config.size_filter);
    assert_eq!(config.size_tolerance, 50.0);
    assert_eq!(config.batch_size, 64);
    assert_eq!(
        config.cache_file(),
        PathBuf::from("/tmp/lookalike-test.sqlite3")
    );
    assert_eq!(config.ignore_patterns, vec!["*.tmp", "raw/"]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_overrides_toml() {
    let _guard = lock_env();
    let (_dir, path) = write_config("threshold = 80\nworkers = 2\n");

    std::env::set_var("LOOKALIKE_THRESHOLD", "95");
    std::env::set_var("LOOKALIKE_ALGORITHM", "Wavelet");
    let config = Config::load(Some(&path));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.threshold, 95.0);
    assert_eq!(config.algorithm, HashAlgorithm::Wavelet);
    assert_eq!(config.workers, 2);
}

#[test]
fn test_cli_overrides_env() {
    let _guard = lock_env();
    std::env::set_var("LOOKALIKE_THRESHOLD", "70");
    std::env::set_var("LOOKALIKE_HASH_SIZE", "12");
    let config = Config::load(None);
    clear_env();
    let mut config = config.unwrap();

    let cli = Cli::try_parse_from(["lookalike", "search", "r.png", "/d", "-t", "99"]).unwrap();
    let Commands::Search(args) = cli.command else {
        panic!("Expected Search command");
    };
    args.apply_to(&mut config).unwrap();

    assert_eq!(config.threshold, 99.0);
    assert_eq!(config.hash_size, 12);
}

#[test]
fn test_unknown_algorithm_in_file_suggests_fix() {
    let _guard = lock_env();
    let (_dir, path) = write_config("algorithm = \"perceptal\"\n");

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
    let message = err.to_string();
    assert!(message.contains("perceptal"), "{message}");
    assert!(message.contains("did you mean 'perceptual'"), "{message}");
}

#[test]
fn test_wrong_type_is_a_load_error() {
    let _guard = lock_env();
    let (_dir, path) = write_config("batch_size = \"lots\"\n");
    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_out_of_range_values_fail_validation() {
    let _guard = lock_env();
    let (_dir, path) = write_config("threshold = 150\n");
    let config = Config::load(Some(&path)).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidThreshold(_))
    ));
}

#[test]
fn test_missing_explicit_file() {
    let _guard = lock_env();
    let dir = tempdir().unwrap();
    assert!(matches!(
        Config::load(Some(&dir.path().join("absent.toml"))),
        Err(ConfigError::MissingFile(_))
    ));
}

#[test]
fn test_printed_config_loads_back() {
    let _guard = lock_env();
    let original = Config {
        algorithm: HashAlgorithm::Average,
        threshold: 77.0,
        skip_hidden: true,
        ..Config::default()
    };
    let (_dir, path) = write_config(&original.to_toml().unwrap());
    assert_eq!(Config::load(Some(&path)).unwrap(), original);
}

use super::fixtures::{corrupt, scenario, stripes};
use clap::Parser;
use lookalike::cli::Cli;
use lookalike::error::ExitCode;
use lookalike::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["lookalike", "-q"];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

fn search(reference: &Path, dir: &Path, cache: &Path, extra: &[&str]) -> anyhow::Result<ExitCode> {
    let reference = reference.to_str().unwrap();
    let dir = dir.to_str().unwrap();
    let cache = cache.to_str().unwrap();
    let mut args = vec![
        "search",
        reference,
        dir,
        "--cache-db",
        cache,
        "--no-size-filter",
        "--no-progress",
    ];
    args.extend_from_slice(extra);
    run(&args)
}

#[test]
fn test_exit_code_success_when_matches_found() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let reference = scenario(dir.path());

    let code = search(&reference, dir.path(), &cache.path().join("c.db"), &[]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(cache.path().join("c.db").exists());
}

#[test]
fn test_exit_code_no_matches() {
    let dir = tempdir().unwrap();
    let refs = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let reference = refs.path().join("stripes.png");
    stripes(64, 64).save(&reference).unwrap();
    scenario(dir.path());
    fs::remove_file(dir.path().join("unrelated.png")).unwrap();

    let code = search(&reference, dir.path(), &cache.path().join("c.db"), &["-t", "99"]).unwrap();
    assert_eq!(code, ExitCode::NoMatches);
}

#[test]
fn test_exit_code_partial_success() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let reference = scenario(dir.path());
    corrupt(dir.path(), "broken.jpg");

    let code = search(
        &reference,
        dir.path(),
        &cache.path().join("c.db"),
        &["--output", "json"],
    )
    .unwrap();
    assert_eq!(code, ExitCode::PartialSuccess);
}

#[test]
fn test_missing_reference_is_an_error() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();

    let err = search(
        &dir.path().join("nope.png"),
        dir.path(),
        &cache.path().join("c.db"),
        &[],
    )
    .unwrap_err();
    assert!(err.to_string().contains("Reference image not found"));
}

#[test]
fn test_unknown_algorithm_is_an_error() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let reference = scenario(dir.path());

    let err = search(&reference, dir.path(), &cache.path().join("c.db"), &["-a", "phahs"])
        .unwrap_err();
    assert!(err.to_string().contains("Unknown hash algorithm"));
}

#[test]
fn test_invalid_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let config = dir.path().join("lookalike.toml");
    fs::write(&config, "hash_size = 1\n").unwrap();

    let err = run(&[
        "--config",
        config.to_str().unwrap(),
        "search",
        reference.to_str().unwrap(),
        dir.path().to_str().unwrap(),
        "--no-cache",
        "--no-progress",
    ])
    .unwrap_err();
    assert!(err.to_string().contains("Hash size"));
}

#[test]
fn test_unusable_cache_degrades_instead_of_failing() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let reference = scenario(dir.path());
    let cache_path = cache.path().join("c.db");
    fs::write(&cache_path, vec![0x42; 4096]).unwrap();

    let code = search(&reference, dir.path(), &cache_path, &[]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_cache_and_index_commands() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let cache_path = cache.path().join("c.db");
    let cache_arg = cache_path.to_str().unwrap();
    let dir_arg = dir.path().to_str().unwrap();
    let reference = scenario(dir.path());

    // Nothing to report before the cache exists.
    assert_eq!(run(&["cache", "stats", "--cache-db", cache_arg]).unwrap(), ExitCode::Success);
    assert!(!cache_path.exists());

    assert_eq!(
        run(&["index", dir_arg, "--cache-db", cache_arg]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(
        search(&reference, dir.path(), &cache_path, &[]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(run(&["cache", "stats", "--cache-db", cache_arg]).unwrap(), ExitCode::Success);
    assert_eq!(run(&["cache", "prune", "--cache-db", cache_arg]).unwrap(), ExitCode::Success);
    assert_eq!(
        run(&["index", dir_arg, "--remove", "--cache-db", cache_arg]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(run(&["cache", "clear", "--cache-db", cache_arg]).unwrap(), ExitCode::Success);

    let store = lookalike::cache::CacheStore::open(&cache_path).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.fingerprints, 0);
    assert_eq!(stats.indexed_roots, 0);
}

#[test]
fn test_filtered_index_is_not_reused_by_unfiltered_search() {
    let dir = tempdir().unwrap();
    let refs = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let cache_path = cache.path().join("c.db");
    let cache_arg = cache_path.to_str().unwrap();
    let dir_arg = dir.path().to_str().unwrap();
    scenario(dir.path());
    let reference = refs.path().join("stripes.png");
    fs::copy(dir.path().join("unrelated.png"), &reference).unwrap();

    assert_eq!(
        run(&["index", dir_arg, "--ignore", "unrelated.png", "--cache-db", cache_arg]).unwrap(),
        ExitCode::Success
    );
    // Searching with the same filter sees the filtered listing.
    assert_eq!(
        search(&reference, dir.path(), &cache_path, &["-t", "99", "--ignore", "unrelated.png"])
            .unwrap(),
        ExitCode::NoMatches
    );
    // Without the filter the stored listing does not apply.
    assert_eq!(
        search(&reference, dir.path(), &cache_path, &["-t", "99"]).unwrap(),
        ExitCode::Success
    );
}

#[test]
fn test_index_missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let cache = tempdir().unwrap();
    let missing = dir.path().join("missing");
    let result = run(&[
        "index",
        missing.to_str().unwrap(),
        "--cache-db",
        cache.path().join("c.db").to_str().unwrap(),
    ]);
    assert!(result.is_err());
}

#[test]
fn test_config_command() {
    assert_eq!(run(&["config"]).unwrap(), ExitCode::Success);
}

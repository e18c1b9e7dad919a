use super::fixtures::{corrupt, scenario};
use filetime::{set_file_mtime, FileTime};
use lookalike::cache::{CacheStore, DirectoryIndex, HashCache};
use lookalike::scanner::WalkerConfig;
use lookalike::search::{SearchConfig, SearchEngine};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn engine(store: Arc<CacheStore>) -> SearchEngine {
    SearchEngine::new(
        SearchConfig::default()
            .with_size_tolerance(None)
            .with_cache(store),
    )
    .unwrap()
}

#[test]
fn test_second_run_is_served_from_cache() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let store = Arc::new(CacheStore::open(&cache_dir.path().join("cache.sqlite3")).unwrap());
    let engine = engine(Arc::clone(&store));

    let first = engine.run(&reference, dir.path()).unwrap();
    assert_eq!(first.stats.cache_hits, 0);
    assert_eq!(first.stats.cache_misses, 3);
    assert_eq!(first.stats.decoded, 3);

    let second = engine.run(&reference, dir.path()).unwrap();
    assert_eq!(second.stats.cache_hits, 3);
    assert_eq!(second.stats.cache_misses, 0);
    assert_eq!(second.stats.decoded, 0);
    assert_eq!(second.matches, first.matches);

    let stats = store.stats().unwrap();
    assert_eq!(stats.fingerprints, 3);
    assert_eq!(stats.indexed_roots, 1);
    assert!(stats.file_size > 0);
}

#[test]
fn test_cache_survives_reopen() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("cache.sqlite3");
    let reference = scenario(dir.path());

    let store = Arc::new(CacheStore::open(&cache_path).unwrap());
    let first = engine(Arc::clone(&store)).run(&reference, dir.path()).unwrap();
    drop(store);

    let reopened = Arc::new(CacheStore::open(&cache_path).unwrap());
    let second = engine(reopened).run(&reference, dir.path()).unwrap();
    assert_eq!(second.stats.decoded, 0);
    assert_eq!(second.matches, first.matches);
}

#[test]
fn test_mtime_change_invalidates_entry() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let store = Arc::new(CacheStore::open_in_memory().unwrap());
    let engine = engine(store);

    engine.run(&reference, dir.path()).unwrap();

    let copy = dir.path().join("copy.png");
    let mtime = FileTime::from_last_modification_time(&fs::metadata(&copy).unwrap());
    set_file_mtime(
        &copy,
        FileTime::from_unix_time(mtime.unix_seconds() + 60, mtime.nanoseconds()),
    )
    .unwrap();

    let outcome = engine.run(&reference, dir.path()).unwrap();
    assert_eq!(outcome.stats.cache_hits, 2);
    assert_eq!(outcome.stats.decoded, 1);
    assert_eq!(outcome.matches[0].distance, 0);
}

#[test]
fn test_different_parameters_do_not_collide() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let store = Arc::new(CacheStore::open_in_memory().unwrap());

    let perceptual = engine(Arc::clone(&store));
    perceptual.run(&reference, dir.path()).unwrap();

    let wavelet = SearchEngine::new(
        SearchConfig::default()
            .with_size_tolerance(None)
            .with_algorithm(lookalike::hashing::HashAlgorithm::Wavelet)
            .with_cache(Arc::clone(&store)),
    )
    .unwrap();
    let outcome = wavelet.run(&reference, dir.path()).unwrap();
    assert_eq!(outcome.stats.cache_hits, 0);
    assert_eq!(outcome.stats.decoded, 3);

    let small = SearchEngine::new(
        SearchConfig::default()
            .with_size_tolerance(None)
            .with_hash_size(8)
            .with_cache(Arc::clone(&store)),
    )
    .unwrap();
    assert_eq!(small.run(&reference, dir.path()).unwrap().stats.cache_hits, 0);

    assert_eq!(HashCache::new(store).len().unwrap(), 9);
}

#[test]
fn test_failed_candidates_are_not_cached() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    corrupt(dir.path(), "broken.png");
    let store = Arc::new(CacheStore::open_in_memory().unwrap());
    let engine = engine(Arc::clone(&store));

    engine.run(&reference, dir.path()).unwrap();
    let second = engine.run(&reference, dir.path()).unwrap();

    assert_eq!(second.stats.cache_hits, 3);
    assert_eq!(second.stats.cache_misses, 1);
    assert_eq!(second.stats.failed, 1);
}

#[test]
fn test_index_tampering_falls_back_to_walk() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("cache.sqlite3");
    let reference = scenario(dir.path());

    let store = Arc::new(CacheStore::open(&cache_path).unwrap());
    engine(Arc::clone(&store)).run(&reference, dir.path()).unwrap();
    drop(store);

    // Rewrite the stored listing behind the index's back.
    let conn = rusqlite_connection(&cache_path);
    conn.execute(
        "UPDATE directory_index SET paths = '[\"/nowhere/fake.png\"]'",
        [],
    )
    .unwrap();
    drop(conn);

    let store = Arc::new(CacheStore::open(&cache_path).unwrap());
    let root = fs::canonicalize(dir.path()).unwrap();
    assert!(DirectoryIndex::new(Arc::clone(&store))
        .get(&root, &WalkerConfig::default())
        .unwrap()
        .is_none());

    let outcome = engine(store).run(&reference, dir.path()).unwrap();
    assert_eq!(outcome.stats.found, 3);
    assert_eq!(outcome.stats.failed, 0);
    assert_eq!(outcome.matches.len(), 2);
}

#[test]
fn test_decomposed_file_name_survives_index_reuse() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("cache.sqlite3");
    let reference = scenario(dir.path());
    let decomposed = dir.path().join("cafe\u{301}.png");
    fs::copy(&reference, &decomposed).unwrap();

    let store = Arc::new(CacheStore::open(&cache_path).unwrap());
    let first = engine(Arc::clone(&store)).run(&reference, dir.path()).unwrap();
    drop(store);
    assert_eq!(first.stats.found, 4);
    assert_eq!(first.stats.failed, 0);

    let store = Arc::new(CacheStore::open(&cache_path).unwrap());
    let second = engine(store).run(&reference, dir.path()).unwrap();
    assert_eq!(second.stats.found, 4);
    assert_eq!(second.stats.failed, 0);
    assert_eq!(second.stats.decoded, 0);
    assert_eq!(second.matches, first.matches);
    assert!(second.matches.iter().all(|m| m.path.exists()));
}

#[test]
fn test_prune_removes_deleted_files() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let store = Arc::new(CacheStore::open_in_memory().unwrap());
    engine(Arc::clone(&store)).run(&reference, dir.path()).unwrap();

    fs::remove_file(dir.path().join("unrelated.png")).unwrap();
    assert_eq!(store.prune_missing().unwrap(), 1);
    assert_eq!(store.stats().unwrap().fingerprints, 2);
    assert_eq!(store.prune_missing().unwrap(), 0);

    store.clear().unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.fingerprints, 0);
    assert_eq!(stats.indexed_roots, 0);
}

#[test]
fn test_garbage_cache_file_is_rejected() {
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("cache.sqlite3");
    fs::write(&cache_path, vec![0x42; 4096]).unwrap();
    assert!(CacheStore::open(&cache_path).is_err());
}

fn rusqlite_connection(path: &Path) -> rusqlite::Connection {
    rusqlite::Connection::open(path).unwrap()
}

use super::fixtures::{corrupt, file_names, scenario};
use lookalike::hashing::HashAlgorithm;
use lookalike::search::{SearchConfig, SearchEngine, SearchError};
use std::fs;
use tempfile::tempdir;

fn config() -> SearchConfig {
    SearchConfig::default()
        .with_threshold(90.0)
        .with_size_tolerance(None)
}

#[test]
fn test_end_to_end_scenario() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());

    let engine = SearchEngine::new(config()).unwrap();
    let outcome = engine.run(&reference, dir.path()).unwrap();

    let names = file_names(outcome.matches.iter().map(|m| m.path.clone()));
    assert_eq!(names, vec!["copy.png", "resized.png"]);

    let exact = &outcome.matches[0];
    assert_eq!(exact.distance, 0);
    assert_eq!(exact.similarity, 100.0);
    assert!(outcome.matches[1].similarity >= 90.0);

    assert_eq!(outcome.stats.found, 3);
    assert_eq!(outcome.stats.processed, 3);
    assert_eq!(outcome.stats.failed, 0);
    assert_eq!(outcome.stats.matched, 2);
    assert!(!outcome.is_partial());
    assert_eq!(outcome.reference.hash_size(), 16);
    assert_eq!(outcome.reference.fingerprint.bit_len(), 256);
}

#[test]
fn test_reference_outside_root_is_not_excluded_twice() {
    let dir = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    let reference = scenario(dir.path());
    let outside = elsewhere.path().join("ref.png");
    fs::copy(&reference, &outside).unwrap();

    let engine = SearchEngine::new(config()).unwrap();
    let outcome = engine.run(&outside, dir.path()).unwrap();

    // reference.png is an ordinary candidate now
    assert_eq!(outcome.stats.found, 4);
    let names = file_names(outcome.matches.iter().map(|m| m.path.clone()));
    assert_eq!(names[..2], ["copy.png", "reference.png"]);
}

#[test]
fn test_corrupted_candidate_is_counted_not_fatal() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let broken = corrupt(dir.path(), "broken.jpg");

    let engine = SearchEngine::new(config()).unwrap();
    let outcome = engine.run(&reference, dir.path()).unwrap();

    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(
        outcome.failures[0].path.file_name(),
        broken.file_name()
    );
    assert!(outcome
        .matches
        .iter()
        .all(|m| m.path.file_name() != broken.file_name()));
    assert_eq!(outcome.matches.len(), 2);
    assert!(outcome.is_partial());
}

#[test]
fn test_empty_image_file_is_a_failure() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    fs::write(dir.path().join("empty.jpg"), b"").unwrap();

    let engine = SearchEngine::new(config()).unwrap();
    let outcome = engine.run(&reference, dir.path()).unwrap();

    assert_eq!(outcome.stats.found, 4);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(file_names(outcome.failures.iter().map(|f| f.path.clone())), vec!["empty.jpg"]);
    assert_eq!(outcome.matches.len(), 2);
}

#[test]
fn test_every_algorithm_finds_the_exact_copy() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());

    for algorithm in HashAlgorithm::ALL {
        for hash_size in [8, 12, 16] {
            let engine = SearchEngine::new(
                config()
                    .with_algorithm(algorithm)
                    .with_hash_size(hash_size),
            )
            .unwrap();
            let outcome = engine.run(&reference, dir.path()).unwrap();

            assert_eq!(
                outcome.reference.fingerprint.bit_len(),
                (hash_size * hash_size) as usize
            );
            let first = &outcome.matches[0];
            assert_eq!(
                first.path.file_name().unwrap(),
                "copy.png",
                "{algorithm} N={hash_size}"
            );
            assert_eq!(first.distance, 0);
        }
    }
}

#[test]
fn test_threshold_zero_matches_everything_decodable() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    corrupt(dir.path(), "broken.png");

    let engine = SearchEngine::new(config().with_threshold(0.0)).unwrap();
    let outcome = engine.run(&reference, dir.path()).unwrap();

    assert_eq!(outcome.matches.len(), 3);
    assert_eq!(outcome.stats.failed, 1);
    for pair in outcome.matches.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_empty_directory() {
    let dir = tempdir().unwrap();
    let refs = tempdir().unwrap();
    let reference = scenario(refs.path());

    let engine = SearchEngine::new(config()).unwrap();
    let outcome = engine.run(&reference, dir.path()).unwrap();

    assert!(outcome.matches.is_empty());
    assert_eq!(outcome.stats.found, 0);
    assert_eq!(outcome.stats.processed, 0);
}

#[test]
fn test_nested_directories_and_ignore_patterns() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());
    let nested = dir.path().join("a").join("b");
    let skipped = dir.path().join("thumbs");
    fs::create_dir_all(&nested).unwrap();
    fs::create_dir_all(&skipped).unwrap();
    fs::copy(&reference, nested.join("deep.PNG")).unwrap();
    fs::copy(&reference, skipped.join("thumb.png")).unwrap();

    let walker = lookalike::scanner::WalkerConfig::new(false, false, vec!["thumbs/".to_string()]);
    let engine = SearchEngine::new(config().with_walker_config(walker)).unwrap();
    let outcome = engine.run(&reference, dir.path()).unwrap();

    let names = file_names(outcome.matches.iter().map(|m| m.path.clone()));
    assert!(names.contains(&"deep.PNG".to_string()));
    assert!(!names.contains(&"thumb.png".to_string()));
}

#[test]
fn test_unreadable_reference() {
    let dir = tempdir().unwrap();
    let reference = corrupt(dir.path(), "reference.jpg");

    let engine = SearchEngine::new(config()).unwrap();
    match engine.run(&reference, dir.path()) {
        Err(SearchError::ReferenceUnreadable { path, .. }) => {
            assert!(path.ends_with("reference.jpg"));
        }
        other => panic!("Expected ReferenceUnreadable, got {:?}", other.map(|o| o.matches)),
    }
}

#[test]
fn test_missing_root() {
    let dir = tempdir().unwrap();
    let reference = scenario(dir.path());

    let engine = SearchEngine::new(config()).unwrap();
    let result = engine.run(&reference, &dir.path().join("does-not-exist"));
    assert!(matches!(result, Err(SearchError::RootNotFound(_))));
}

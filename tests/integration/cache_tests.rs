use filetime::FileTime;
use photosync::cache::{CacheEntry, HashCache, Lookup};
use photosync::duplicates::{ScanConfig, TreeScanner};
use photosync::scanner::{Eligibility, HashAlgorithm, Hasher, DEFAULT_MIN_SIZE};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn media(seed: u8) -> Vec<u8> {
    vec![seed; DEFAULT_MIN_SIZE as usize + 64]
}

fn pin_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

#[test]
fn test_cache_initial_scan_and_rescan() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("state/hash_cache.json");
    let tree = dir.path().join("tree");
    fs::create_dir_all(&tree).unwrap();
    fs::write(tree.join("a.jpg"), media(1)).unwrap();
    fs::write(tree.join("b.jpg"), media(2)).unwrap();

    let cache = HashCache::load(&cache_path, Hasher::default(), Eligibility::default());
    let scanner = TreeScanner::new(&cache, ScanConfig::default().with_threads(2));
    let (index, stats) = scanner.scan(&tree, "source");
    assert_eq!(index.len(), 2);
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 0);
    assert!(cache.save_or_log());

    // A new process reloads the file and reads no content
    let reloaded = HashCache::load(&cache_path, Hasher::default(), Eligibility::default());
    assert_eq!(reloaded.len(), 2);
    let scanner = TreeScanner::new(&reloaded, ScanConfig::default().with_threads(2));
    let (index2, stats2) = scanner.scan(&tree, "source");
    assert_eq!(index2.len(), 2);
    assert_eq!(stats2.cache_hits, 2);
    assert_eq!(stats2.cache_misses, 0);
    assert_eq!(reloaded.computed_count(), 0);
}

#[test]
fn test_unchanged_size_and_mtime_serves_stale_digest() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("photo.jpg");
    fs::write(&file, media(1)).unwrap();
    pin_mtime(&file, 1_600_000_000);

    let cache = HashCache::new(
        dir.path().join("cache.json"),
        Hasher::default(),
        Eligibility::default(),
    );
    let original = cache.lookup(&file).unwrap().into_digest().unwrap();

    // Same length, same mtime, different bytes
    fs::write(&file, media(9)).unwrap();
    pin_mtime(&file, 1_600_000_000);
    assert_eq!(cache.lookup(&file).unwrap(), Lookup::Cached(original.clone()));

    // Touching the mtime invalidates the entry
    pin_mtime(&file, 1_600_000_100);
    let refreshed = cache.lookup(&file).unwrap();
    assert!(matches!(refreshed, Lookup::Computed(ref d) if *d != original));
}

#[test]
fn test_saved_file_format() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("photo.jpg");
    fs::write(&file, media(4)).unwrap();
    pin_mtime(&file, 1_700_000_000);

    let cache_path = dir.path().join("hash_cache.json");
    let cache = HashCache::new(&cache_path, Hasher::default(), Eligibility::default());
    let digest = cache.get_or_compute(&file).unwrap();
    cache.save().unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cache_path).unwrap()).unwrap();
    let record = &json[file.to_string_lossy().as_ref()];
    assert_eq!(record["size"], media(4).len() as u64);
    assert_eq!(record["mtime"], 1_700_000_000i64);
    assert_eq!(record["hash"], digest.as_str());
    assert_eq!(digest.len(), 16);
}

#[test]
fn test_entries_written_by_earlier_tools_are_reused() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("photo.jpg");
    fs::write(&file, media(5)).unwrap();
    pin_mtime(&file, 1_650_000_000);

    let cache_path = dir.path().join("hash_cache.json");
    let key = file.to_string_lossy().into_owned();
    let doc = serde_json::json!({
        key: { "size": media(5).len(), "mtime": 1_650_000_000i64, "hash": "feedface00000000" },
        "/no/longer/there.jpg": { "size": 1, "mtime": 1, "hash": "00" }
    });
    fs::write(&cache_path, doc.to_string()).unwrap();

    let cache = HashCache::load(&cache_path, Hasher::default(), Eligibility::default());
    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.get(&file),
        Some(CacheEntry::new(media(5).len() as u64, 1_650_000_000, "feedface00000000"))
    );
    assert_eq!(
        cache.get_or_compute(&file).as_deref(),
        Some("feedface00000000")
    );
}

#[test]
fn test_ineligible_files_never_enter_cache() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("small.jpg"), b"tiny").unwrap();
    fs::write(dir.path().join("notes.TXT"), media(1)).unwrap();
    fs::write(dir.path().join("Thumbs.db"), media(2)).unwrap();

    let cache = HashCache::new(
        dir.path().join("cache.json"),
        Hasher::default(),
        Eligibility::default(),
    );
    let (index, stats) =
        TreeScanner::new(&cache, ScanConfig::default()).scan(dir.path(), "source");

    assert!(index.is_empty());
    assert_eq!(stats.ineligible, 3);
    assert!(cache.is_empty());
}

#[test]
fn test_cryptographic_algorithm_in_cache() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("photo.jpg");
    fs::write(&file, media(6)).unwrap();

    let cache = HashCache::new(
        dir.path().join("cache.json"),
        Hasher::new(HashAlgorithm::Sha256),
        Eligibility::default(),
    );
    let digest = cache.get_or_compute(&file).unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(cache.hasher().algorithm(), HashAlgorithm::Sha256);
}

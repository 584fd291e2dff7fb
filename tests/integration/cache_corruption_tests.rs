use photosync::cache::{CacheError, HashCache};
use photosync::scanner::{Eligibility, Hasher, DEFAULT_MIN_SIZE};
use std::fs;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_corrupt_file_reports_reason_and_load_recovers() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();
    fs::write(path, b"{ this is not json").unwrap();

    let err = HashCache::try_load(path, Hasher::default(), Eligibility::default()).unwrap_err();
    assert!(matches!(err, CacheError::Corrupt { .. }));
    assert_eq!(err.reason(), "corrupt");

    let cache = HashCache::load(path, Hasher::default(), Eligibility::default());
    assert!(cache.is_empty());
}

#[test]
fn test_wrong_shape_is_corrupt() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), br#"["a", "b"]"#).unwrap();

    let err = HashCache::read_entries(temp_file.path()).unwrap_err();
    assert_eq!(err.reason(), "corrupt");
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = HashCache::try_load(&path, Hasher::default(), Eligibility::default()).unwrap_err();
    assert_eq!(err.reason(), "not-found");
    assert!(HashCache::load(&path, Hasher::default(), Eligibility::default()).is_empty());
}

#[test]
fn test_empty_file_is_empty_cache() {
    let temp_file = NamedTempFile::new().unwrap();
    let cache =
        HashCache::try_load(temp_file.path(), Hasher::default(), Eligibility::default()).unwrap();
    assert!(cache.is_empty());
    assert_eq!(HashCache::count_entries(temp_file.path()).unwrap(), 0);
}

#[test]
fn test_corrupt_cache_is_replaced_on_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hash_cache.json");
    fs::write(&path, b"\x00\x01garbage").unwrap();
    let photo = dir.path().join("photo.jpg");
    fs::write(&photo, vec![3u8; DEFAULT_MIN_SIZE as usize]).unwrap();

    let cache = HashCache::load(&path, Hasher::default(), Eligibility::default());
    cache.get_or_compute(&photo).unwrap();
    assert!(cache.save_or_log());

    assert_eq!(HashCache::count_entries(&path).unwrap(), 1);
}

#[test]
fn test_unwritable_location_does_not_panic() {
    let temp_file = NamedTempFile::new().unwrap();
    // Parent of the cache path is a regular file, so the directory cannot be created
    let path = temp_file.path().join("nested/hash_cache.json");

    let cache = HashCache::new(&path, Hasher::default(), Eligibility::default());
    assert!(cache.save().is_err());
    assert!(!cache.save_or_log());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_permission_denied() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("hash_cache.json");
    fs::write(&path, b"{}").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores file modes
    if fs::read(&path).is_ok() {
        return;
    }
    let err = HashCache::read_entries(&path).unwrap_err();
    assert_eq!(err.reason(), "permission-denied");
    assert!(HashCache::load(&path, Hasher::default(), Eligibility::default()).is_empty());
}

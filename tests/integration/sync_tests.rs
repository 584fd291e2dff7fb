use chrono::{Local, TimeZone};
use clap::Parser;
use filetime::FileTime;
use photosync::actions::RelocationMode;
use photosync::cache::HashCache;
use photosync::cli::Cli;
use photosync::config::SyncConfig;
use photosync::error::ExitCode;
use photosync::scanner::{HashAlgorithm, DEFAULT_MIN_SIZE};
use photosync::sync::Synchronizer;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn media(seed: u8) -> Vec<u8> {
    vec![seed; DEFAULT_MIN_SIZE as usize + 512]
}

fn set_month(path: &Path, year: i32, month: u32) {
    let t = Local.with_ymd_and_hms(year, month, 20, 12, 0, 0).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(t.timestamp(), 0)).unwrap();
}

fn base_config(root: &Path) -> SyncConfig {
    SyncConfig {
        source: root.join("duplicates"),
        destination: root.join("sorted"),
        cache_file: root.join("state/hash_cache.json"),
        threads: 3,
        ..SyncConfig::default()
    }
}

#[test]
fn test_example_scenario_end_to_end() {
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    fs::create_dir_all(config.destination.join("2023/01")).unwrap();
    fs::create_dir_all(config.source.join("dump")).unwrap();
    fs::write(config.destination.join("2023/01/a.jpg"), media(1)).unwrap();
    fs::write(config.source.join("dump/a_copy.jpg"), media(1)).unwrap();
    let b = config.source.join("dump/b.jpg");
    fs::write(&b, media(2)).unwrap();
    set_month(&b, 2022, 6);

    let summary = Synchronizer::new(config.clone()).run();

    assert_eq!(summary.novel, 1);
    assert_eq!(summary.relocated, 1);
    assert!(config.destination.join("2022/06/b.jpg").exists());
    assert!(config.source.join("dump/a_copy.jpg").exists());
    assert!(!b.exists());
    assert_eq!(summary.pruned_dirs, 0);

    // Once the duplicate is gone too, the dump directory is pruned
    fs::remove_file(config.source.join("dump/a_copy.jpg")).unwrap();
    let again = Synchronizer::new(config.clone()).run();
    assert_eq!(again.novel, 0);
    assert_eq!(again.pruned_dirs, 1);
    assert!(!config.source.join("dump").exists());
    assert!(config.source.exists());
}

#[test]
fn test_duplicate_sources_collapse_to_one_relocation() {
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    fs::create_dir_all(config.source.join("x")).unwrap();
    fs::create_dir_all(config.source.join("y")).unwrap();
    fs::write(config.source.join("x/same.jpg"), media(7)).unwrap();
    fs::write(config.source.join("y/same.jpg"), media(7)).unwrap();

    let summary = Synchronizer::new(config.clone()).run();

    assert_eq!(summary.novel, 1);
    assert_eq!(summary.source.duplicates_collapsed, 1);
    // Lexicographically smallest path is the one relocated
    assert!(!config.source.join("x/same.jpg").exists());
    assert!(config.source.join("y/same.jpg").exists());
}

#[test]
fn test_same_name_same_month_both_survive() {
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    fs::create_dir_all(config.source.join("cam1")).unwrap();
    fs::create_dir_all(config.source.join("cam2")).unwrap();
    let first = config.source.join("cam1/IMG_0001.jpg");
    let second = config.source.join("cam2/IMG_0001.jpg");
    fs::write(&first, media(1)).unwrap();
    fs::write(&second, media(2)).unwrap();
    set_month(&first, 2021, 9);
    set_month(&second, 2021, 9);

    let summary = Synchronizer::new(config.clone()).run();

    assert_eq!(summary.relocated, 2);
    assert_eq!(
        fs::read(config.destination.join("2021/09/IMG_0001.jpg")).unwrap(),
        media(1)
    );
    assert_eq!(
        fs::read(config.destination.join("2021/09/IMG_0001_1.jpg")).unwrap(),
        media(2)
    );
}

#[test]
fn test_small_and_excluded_files_never_move() {
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    fs::create_dir_all(&config.source).unwrap();
    fs::write(config.source.join("tiny.jpg"), b"small").unwrap();
    fs::write(config.source.join("sidecar.AAE"), media(3)).unwrap();
    fs::write(config.source.join(".nomedia"), media(4)).unwrap();

    let summary = Synchronizer::new(config.clone()).run();

    assert_eq!(summary.novel, 0);
    assert_eq!(summary.source.ineligible, 3);
    assert!(config.source.join("tiny.jpg").exists());
    assert!(config.source.join("sidecar.AAE").exists());
    assert!(!config.destination.exists());
}

#[test]
fn test_ignored_directories_are_not_synced() {
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    fs::create_dir_all(config.source.join("@eaDir")).unwrap();
    fs::create_dir_all(config.source.join("album")).unwrap();
    fs::write(config.source.join("@eaDir/thumb.jpg"), media(5)).unwrap();
    fs::write(config.source.join("album/real.jpg"), media(6)).unwrap();

    let summary = Synchronizer::new(config.clone()).run();

    assert_eq!(summary.novel, 1);
    assert!(config.source.join("@eaDir/thumb.jpg").exists());
    assert!(!config.source.join("album").exists());
}

#[test]
fn test_mirror_copy_mode_with_blake3() {
    let dir = tempdir().unwrap();
    let config = SyncConfig {
        date_structure: false,
        mode: RelocationMode::Copy,
        hash_algorithm: HashAlgorithm::Blake3,
        ..base_config(dir.path())
    };
    fs::create_dir_all(config.source.join("trip/day2")).unwrap();
    fs::write(config.source.join("trip/day2/pano.jpg"), media(8)).unwrap();

    let summary = Synchronizer::new(config.clone()).run();

    assert_eq!(summary.relocated, 1);
    assert!(config.destination.join("trip/day2/pano.jpg").exists());
    assert!(config.source.join("trip/day2/pano.jpg").exists());

    let entries = HashCache::read_entries(&config.cache_file).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.values().all(|e| e.hash.len() == 64));
}

#[test]
fn test_missing_source_completes() {
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());

    let summary = Synchronizer::new(config).run();

    assert_eq!(summary.novel, 0);
    assert_eq!(summary.relocated, 0);
    assert!(!summary.interrupted);
}

#[test]
fn test_run_app_from_config_file() {
    let _guard = crate::lock_env();
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    fs::create_dir_all(&config.source).unwrap();
    let photo = config.source.join("new.jpg");
    fs::write(&photo, media(9)).unwrap();
    set_month(&photo, 2020, 5);

    let config_file = dir.path().join("photosync.toml");
    fs::write(&config_file, config.to_toml().unwrap()).unwrap();

    let cli = Cli::try_parse_from([
        "photosync",
        "--config",
        config_file.to_str().unwrap(),
        "run",
        "--dry-run",
    ])
    .unwrap();
    assert_eq!(photosync::run_app(cli).unwrap(), ExitCode::Success);
    assert!(photo.exists());
    assert_eq!(HashCache::count_entries(&config.cache_file).unwrap(), 1);

    let cli = Cli::try_parse_from(["photosync", "--config", config_file.to_str().unwrap()]).unwrap();
    assert_eq!(photosync::run_app(cli).unwrap(), ExitCode::Success);
    assert!(!photo.exists());
    assert!(config.destination.join("2020/05/new.jpg").exists());
}

#[test]
fn test_run_app_rejects_same_source_and_destination() {
    let _guard = crate::lock_env();
    let dir = tempdir().unwrap();
    let config = SyncConfig {
        destination: dir.path().join("duplicates"),
        ..base_config(dir.path())
    };
    let config_file = dir.path().join("photosync.toml");
    fs::write(&config_file, config.to_toml().unwrap()).unwrap();

    let cli = Cli::try_parse_from(["photosync", "--config", config_file.to_str().unwrap()]).unwrap();
    assert!(photosync::run_app(cli).is_err());
}

#[test]
fn test_status_subcommand_reads_cache() {
    let _guard = crate::lock_env();
    let dir = tempdir().unwrap();
    let config = base_config(dir.path());
    let config_file = dir.path().join("photosync.toml");
    fs::write(&config_file, config.to_toml().unwrap()).unwrap();

    let cli = Cli::try_parse_from([
        "photosync",
        "--config",
        config_file.to_str().unwrap(),
        "status",
    ])
    .unwrap();
    assert_eq!(photosync::run_app(cli).unwrap(), ExitCode::Success);
}

#[test]
fn test_relative_roots_produce_absolute_cache_keys() {
    let _guard = crate::lock_env();
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("dump")).unwrap();
    fs::write(dir.path().join("dump/x.jpg"), media(11)).unwrap();
    fs::write(
        dir.path().join("photosync.toml"),
        "source = \"dump\"\ndestination = \"sorted\"\ncache_file = \"state/hash_cache.json\"\ndry_run = true\n",
    )
    .unwrap();

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let cli = Cli::try_parse_from(["photosync", "--config", "photosync.toml"]).unwrap();
    let outcome = photosync::run_app(cli);
    std::env::set_current_dir(previous).unwrap();

    assert_eq!(outcome.unwrap(), ExitCode::Success);
    let entries = HashCache::read_entries(&dir.path().join("state/hash_cache.json")).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.keys().all(|k| k.is_absolute()));
    assert!(entries.keys().all(|k| k.ends_with("dump/x.jpg")));
}

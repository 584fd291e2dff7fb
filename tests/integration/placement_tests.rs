use chrono::{Local, TimeZone};
use filetime::FileTime;
use photosync::actions::{
    prune_empty_dirs, resolve_collision, Layout, PlaceAction, Placer, PlacerConfig,
    RelocationMode,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn set_month(path: &Path, year: i32, month: u32) {
    let t = Local.with_ymd_and_hms(year, month, 10, 8, 30, 0).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(t.timestamp(), 0)).unwrap();
}

fn config(src: &Path, dst: &Path, layout: Layout, mode: RelocationMode, dry_run: bool) -> PlacerConfig {
    PlacerConfig {
        source_root: src.to_path_buf(),
        destination_root: dst.to_path_buf(),
        layout,
        mode,
        dry_run,
    }
}

#[test]
fn test_existing_destination_files_push_suffix_forward() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(dst.join("2020/02")).unwrap();
    fs::write(dst.join("2020/02/IMG.jpg"), b"older").unwrap();
    fs::write(dst.join("2020/02/IMG_1.jpg"), b"older too").unwrap();

    let file = src.join("IMG.jpg");
    fs::write(&file, b"new content").unwrap();
    set_month(&file, 2020, 2);

    let mut placer = Placer::new(config(&src, &dst, Layout::Date, RelocationMode::Move, false));
    let placement = placer.place(&file).unwrap();

    assert_eq!(placement.destination, dst.join("2020/02/IMG_2.jpg"));
    assert_eq!(fs::read(dst.join("2020/02/IMG.jpg")).unwrap(), b"older");
    assert_eq!(fs::read(dst.join("2020/02/IMG_2.jpg")).unwrap(), b"new content");
}

#[test]
fn test_dry_run_reports_same_names_as_real_run() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    let files: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|sub| {
            let d = src.join(sub);
            fs::create_dir_all(&d).unwrap();
            let f = d.join("DSC.jpg");
            fs::write(&f, sub.as_bytes()).unwrap();
            set_month(&f, 2018, 12);
            f
        })
        .collect();

    let mut dry = Placer::new(config(&src, &dst, Layout::Date, RelocationMode::Copy, true));
    let planned: Vec<PathBuf> = dry
        .place_all(&files)
        .placements
        .into_iter()
        .map(|p| p.destination)
        .collect();
    assert!(!dst.exists());

    let mut real = Placer::new(config(&src, &dst, Layout::Date, RelocationMode::Copy, false));
    let result = real.place_all(&files);
    let actual: Vec<PathBuf> = result.placements.iter().map(|p| p.destination.clone()).collect();

    assert_eq!(planned, actual);
    assert_eq!(
        actual,
        vec![
            dst.join("2018/12/DSC.jpg"),
            dst.join("2018/12/DSC_1.jpg"),
            dst.join("2018/12/DSC_2.jpg"),
        ]
    );
    assert!(result.placements.iter().all(|p| p.action == PlaceAction::Copied));
    assert!(files.iter().all(|f| f.exists()));
}

#[test]
fn test_mirror_layout_creates_nested_dirs() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(src.join("2019/holiday/raw")).unwrap();
    let file = src.join("2019/holiday/raw/P1.CR2");
    fs::write(&file, b"raw").unwrap();

    let mut placer = Placer::new(config(&src, &dst, Layout::Mirror, RelocationMode::Move, false));
    let placement = placer.place(&file).unwrap();

    assert_eq!(placement.destination, dst.join("2019/holiday/raw/P1.CR2"));
    assert_eq!(placement.action, PlaceAction::Moved);
    assert!(!file.exists());
}

#[test]
fn test_move_then_prune_leaves_only_nonempty_dirs() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(src.join("dump/inner")).unwrap();
    fs::create_dir_all(src.join("keep")).unwrap();
    fs::create_dir_all(src.join("@eaDir/thumbs")).unwrap();
    let moved = src.join("dump/inner/x.jpg");
    fs::write(&moved, b"x").unwrap();
    fs::write(src.join("keep/y.jpg"), b"y").unwrap();

    let mut placer = Placer::new(config(&src, &dst, Layout::Mirror, RelocationMode::Move, false));
    assert!(placer.place_all(&[moved]).all_succeeded());

    let pruned = prune_empty_dirs(&src, &["@eaDir".to_string()]);
    assert_eq!(pruned.removed_count(), 2);
    assert!(!src.join("dump").exists());
    assert!(src.join("keep/y.jpg").exists());
    assert!(src.join("@eaDir/thumbs").exists());
    assert!(src.exists());
}

#[test]
fn test_resolve_collision_checks_filesystem() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("clip.mp4"), b"").unwrap();
    fs::write(dir.path().join("clip_1.mp4"), b"").unwrap();

    let free = resolve_collision(&dir.path().join("clip.mp4"), |p| p.exists());
    assert_eq!(free, dir.path().join("clip_2.mp4"));
}

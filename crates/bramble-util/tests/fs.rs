use bramble_util::fs::{nearest_file, toml_files_in};
use tempfile::TempDir;

#[test]
fn test_nearest_file_in_start_dir() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("bramble.toml"), "").unwrap();
    let result = nearest_file(tmp.path(), "bramble.toml");
    assert_eq!(result, Some(tmp.path().join("bramble.toml")));
}

#[test]
fn test_nearest_file_prefers_closest() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(tmp.path().join("bramble.toml"), "").unwrap();
    std::fs::write(tmp.path().join("a").join("bramble.toml"), "").unwrap();
    let result = nearest_file(&nested, "bramble.toml");
    assert_eq!(result, Some(tmp.path().join("a").join("bramble.toml")));
}

#[test]
fn test_nearest_file_ignores_directories() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("bramble.toml")).unwrap();
    let nested = tmp.path().join("x");
    std::fs::create_dir(&nested).unwrap();
    let found = nearest_file(&nested, "bramble.toml");
    assert_ne!(found, Some(tmp.path().join("bramble.toml")));
}

#[test]
fn test_toml_files_sorted_and_filtered() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("zlib.toml"), "").unwrap();
    std::fs::write(tmp.path().join("cmake.toml"), "").unwrap();
    std::fs::write(tmp.path().join("README.md"), "").unwrap();
    std::fs::create_dir(tmp.path().join("nested.toml")).unwrap();

    let files = toml_files_in(tmp.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["cmake.toml", "zlib.toml"]);
}

#[test]
fn test_toml_files_missing_dir_is_error() {
    let tmp = TempDir::new().unwrap();
    assert!(toml_files_in(&tmp.path().join("missing")).is_err());
}

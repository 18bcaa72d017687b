use bramble_core::repository::{DirectorySource, LookupError, RecipeSource};
use std::fs;

const ZLIB: &str = r#"
[package]
name = "zlib"

[[versions]]
version = "1.3"
[[versions]]
version = "1.2.13"

[variants.shared]
default = true
"#;

const HDF5: &str = r#"
[package]
name = "hdf5"

[[versions]]
version = "1.14.0"

[[depends]]
spec = "zlib+shared"
"#;

#[test]
fn loads_flat_and_nested_recipes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("zlib.toml"), ZLIB).unwrap();
    fs::create_dir(dir.path().join("hdf5")).unwrap();
    fs::write(dir.path().join("hdf5").join("recipe.toml"), HDF5).unwrap();

    let source = DirectorySource::new(dir.path());
    assert_eq!(source.names().unwrap(), vec!["hdf5", "zlib"]);

    let zlib = source.lookup("zlib").unwrap();
    assert_eq!(zlib.versions.len(), 2);
    let hdf5 = source.lookup("hdf5").unwrap();
    assert_eq!(hdf5.depends[0].target, "zlib");
}

#[test]
fn missing_recipe_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path());
    assert!(matches!(
        source.lookup("cmake"),
        Err(LookupError::NotFound { .. })
    ));
}

#[test]
fn invalid_recipe_is_rejected_alone() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("zlib.toml"), ZLIB).unwrap();
    fs::write(
        dir.path().join("broken.toml"),
        "[package]\nname = \"broken\"\n[[versions]]\nversion = \"not a version\"\n",
    )
    .unwrap();

    let source = DirectorySource::new(dir.path());
    assert!(matches!(
        source.lookup("broken"),
        Err(LookupError::Invalid { .. })
    ));
    assert!(source.lookup("zlib").is_ok());
}

#[test]
fn file_name_must_match_package_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("libz.toml"), ZLIB).unwrap();
    let source = DirectorySource::new(dir.path());
    let err = source.lookup("libz").unwrap_err();
    assert!(err.detail().contains("expected `libz`"), "{}", err.detail());
}

#[test]
fn names_of_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path().join("absent"));
    assert!(matches!(source.names(), Err(LookupError::Io { .. })));
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn bramble_cmd() -> Command {
    Command::cargo_bin("bramble").unwrap()
}

fn recipes() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../recipes")
}

/// Run from an empty directory so no local bramble.toml is picked up.
fn in_tmp(tmp: &TempDir) -> Command {
    let mut cmd = bramble_cmd();
    cmd.current_dir(tmp.path())
        .env_remove("BRAMBLE_CONFIG")
        .env("HOME", tmp.path())
        .arg("--repo")
        .arg(recipes());
    cmd
}

#[test]
fn test_resolve_prints_every_package() {
    let tmp = TempDir::new().unwrap();

    in_tmp(&tmp)
        .args(["resolve", "crtm@v2.4-jedi.1 +fix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("crtm@v2.4-jedi.1"))
        .stdout(predicate::str::contains("netcdf-fortran@4.6.1"))
        .stdout(predicate::str::contains("ecbuild@3.7.2"))
        .stdout(predicate::str::contains("cmake@3.27.9"))
        .stdout(predicate::str::contains("crtm-fix").not())
        .stderr(predicate::str::contains("Resolving"));
}

#[test]
fn test_resolve_json() {
    let tmp = TempDir::new().unwrap();

    in_tmp(&tmp)
        .args(["resolve", "zlib", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"root\": \"zlib\""))
        .stdout(predicate::str::contains("\"version\": \"1.3\""));
}

#[test]
fn test_resolve_unsatisfiable_request_fails() {
    let tmp = TempDir::new().unwrap();

    in_tmp(&tmp)
        .args(["resolve", "cmake@4:"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dependency resolution failed"));
}

#[test]
fn test_resolve_bad_spec_fails() {
    let tmp = TempDir::new().unwrap();

    in_tmp(&tmp)
        .args(["resolve", "crtm ^cmake"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid spec"));
}

#[test]
fn test_platform_flag_activates_platform_guards() {
    let tmp = TempDir::new().unwrap();

    in_tmp(&tmp)
        .args(["resolve", "base-env", "--platform", "darwin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("libbacktrace@2023.11.29"));

    in_tmp(&tmp)
        .args(["resolve", "base-env", "--platform", "linux"])
        .assert()
        .success()
        .stdout(predicate::str::contains("libbacktrace").not())
        .stdout(predicate::str::contains("note: py-pip → python"))
        .stdout(predicate::str::contains("parallelio@2.6.2"))
        .stdout(predicate::str::contains("parallel-netcdf@1.12.3"))
        .stdout(predicate::str::contains("nccmp@1.9.1.0"))
        .stdout(predicate::str::contains("wget@1.21.4"));
}

#[test]
fn test_config_file_variants_apply() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("bramble.toml"),
        "[variants]\nmpi = true\n",
    )
    .unwrap();

    in_tmp(&tmp)
        .args(["resolve", "netcdf-c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mpich@4.1.2"));
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();

    in_tmp(&tmp)
        .args(["--config", "nope.toml", "resolve", "zlib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

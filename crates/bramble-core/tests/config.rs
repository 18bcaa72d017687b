use bramble_core::config::{dirs_path, ArchKey, ConfigVariant, ResolveConfig};
use bramble_core::variant::RequiredValue;

#[test]
fn default_config_uses_host_platform() {
    let config = ResolveConfig::default();
    assert!(!config.arch.platform.is_empty());
    assert_ne!(config.arch.platform, "macos");
    assert!(config.arch.os.is_none());
}

#[test]
fn default_limits_are_positive() {
    let config = ResolveConfig::default();
    assert!(config.resolver.max_backtracks > 0);
    assert!(config.resolver.prefetch_jobs > 0);
}

#[test]
fn empty_toml_matches_defaults() {
    let config = ResolveConfig::parse("").unwrap();
    assert_eq!(config.arch, ResolveConfig::default().arch);
    assert!(config.variants.is_empty());
}

#[test]
fn dirs_path_contains_bramble() {
    assert!(dirs_path().ends_with(".bramble"));
}

#[test]
fn parse_full_config() {
    let toml = r#"
[arch]
platform = "darwin"
os = "ventura"
target = "m1"

[variants]
shared = false
build_type = "Release"
cxxstd = ["14", "17"]

[resolver]
max-backtracks = 50
prefetch-jobs = 2
"#;
    let config = ResolveConfig::parse(toml).unwrap();
    assert_eq!(config.arch.get(ArchKey::Platform), Some("darwin"));
    assert_eq!(config.arch.get(ArchKey::Os), Some("ventura"));
    assert_eq!(config.arch.get(ArchKey::Target), Some("m1"));
    assert_eq!(config.variants["shared"], ConfigVariant::Flag(false));
    assert_eq!(
        config.variants["build_type"].requirement(),
        RequiredValue::Values(vec!["Release".into()])
    );
    assert_eq!(
        config.variants["cxxstd"].requirement(),
        RequiredValue::Values(vec!["14".into(), "17".into()])
    );
    assert_eq!(config.resolver.max_backtracks, 50);
    assert_eq!(config.resolver.prefetch_jobs, 2);
}

#[test]
fn partial_arch_keeps_host_platform() {
    let config = ResolveConfig::parse("[arch]\nos = \"rhel8\"\n").unwrap();
    assert_eq!(config.arch.platform, ResolveConfig::default().arch.platform);
    assert_eq!(config.arch.os.as_deref(), Some("rhel8"));
}

#[test]
fn malformed_config_is_an_error() {
    assert!(ResolveConfig::parse("[resolver]\nmax-backtracks = \"many\"").is_err());
}

#[test]
fn load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bramble.toml");
    std::fs::write(&path, "[arch]\nplatform = \"cray\"\n").unwrap();
    let config = ResolveConfig::load(Some(&path)).unwrap();
    assert_eq!(config.arch.platform, "cray");
}

#[test]
fn load_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ResolveConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
}

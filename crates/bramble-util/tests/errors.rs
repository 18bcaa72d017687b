use bramble_util::errors::BrambleError;

#[test]
fn test_recipe_error_display() {
    let err = BrambleError::Recipe {
        message: "bad version".to_string(),
    };
    assert_eq!(err.to_string(), "Recipe error: bad version");
}

#[test]
fn test_resolution_error_display() {
    let err = BrambleError::Resolution {
        message: "cycle".to_string(),
    };
    assert_eq!(err.to_string(), "Dependency resolution failed: cycle");
}

#[test]
fn test_repository_error_display() {
    let err = BrambleError::Repository {
        message: "not a directory".to_string(),
    };
    assert_eq!(err.to_string(), "Repository error: not a directory");
}

#[test]
fn test_generic_error_display() {
    let err = BrambleError::Generic {
        message: "something broke".to_string(),
    };
    assert_eq!(err.to_string(), "something broke");
}

#[test]
fn test_recipe_error_has_help() {
    use miette::Diagnostic;
    let err = BrambleError::Recipe {
        message: "x".to_string(),
    };
    let help = err.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("bramble check"));
}

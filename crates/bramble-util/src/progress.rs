//! Styled status lines on stderr, so stdout stays clean for graph output.

use std::io::Write;

use console::Style;

fn print_status(style: Style, label: &str, message: &str) {
    let _ = writeln!(std::io::stderr(), "{:>12} {message}", style.apply_to(label));
}

/// Print a Cargo-style status line: `   Resolving crtm@v2.4-jedi.1 +fix`
///
/// The `label` is right-aligned to 12 columns in bold green.
pub fn status(label: &str, message: &str) {
    print_status(Style::new().green().bold(), label, message);
}

/// Bold yellow label, for problems that do not stop the operation.
pub fn status_warn(label: &str, message: &str) {
    print_status(Style::new().yellow().bold(), label, message);
}

/// Bold red label.
pub fn status_error(label: &str, message: &str) {
    print_status(Style::new().red().bold(), label, message);
}

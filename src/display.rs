use owo_colors::OwoColorize;
use serde::Serialize;

/// Prints `data` as pretty JSON in JSON mode, otherwise hands it to `render`.
pub fn output<T: Serialize + ?Sized>(json_mode: bool, data: &T, render: impl FnOnce(&T)) {
    if json_mode {
        match serde_json::to_string_pretty(data) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{} Failed to serialize JSON: {e}", "error:".red().bold()),
        }
    } else {
        render(data);
    }
}

pub fn success(msg: &str) {
    eprintln!("{} {msg}", "✓".green().bold());
}

pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "warning:".yellow().bold());
}

pub fn error(msg: &str) {
    eprintln!("{} {msg}", "error:".red().bold());
}

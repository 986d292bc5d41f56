use lbtest_rs::Report;
use std::io::Write;
use std::path::Path;

/// Write text to stdout or, if given, to a file.
pub fn write_output(text: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => std::fs::write(Path::new(path), text)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .and_then(|_| handle.flush())
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value)
        .map(|json| json + "\n")
        .map_err(|e| format!("JSON serialization failed: {}", e))
}

/// Print the final report as a table followed by the error summary, or as JSON.
pub fn emit_report(report: &Report, json: bool, output_path: Option<&str>) -> Result<(), String> {
    if json {
        write_output(&to_json(report)?, output_path)?;
        log::info!("{}", report.summary());
        return Ok(());
    }

    let mut text = String::from("\n");
    text.push_str(&"=".repeat(80));
    text.push('\n');
    text.push_str(&report.render());
    text.push_str(&report.summary());
    text.push('\n');
    write_output(&text, None)
}

//! Per-subtest records and the final suite report.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Outcome of one subtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtestRecord {
    /// Report label, `<test label>[<index>]` when the test has several subtests.
    pub label: String,
    pub elapsed_secs: f64,
    pub errors: u32,
    pub skipped: bool,
}

impl SubtestRecord {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            elapsed_secs: 0.0,
            errors: 0,
            skipped: false,
        }
    }
}

/// All subtest records of one descriptor (or one unittest run).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub label: String,
    pub disabled: bool,
    pub subtests: Vec<SubtestRecord>,
}

impl TestRecord {
    /// Create a record with `count` pending subtests.
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        let label = label.into();
        let subtests = if count == 1 {
            vec![SubtestRecord::new(label.clone())]
        } else {
            (0..count)
                .map(|i| SubtestRecord::new(format!("{}[{}]", label, i)))
                .collect()
        };
        Self {
            label,
            disabled: false,
            subtests,
        }
    }

    /// Append `suffix` to the record's label and to every subtest label.
    pub fn append_label_suffix(&mut self, suffix: &str) {
        self.label.push_str(suffix);
        for subtest in &mut self.subtests {
            subtest.label.push_str(suffix);
        }
    }

    pub fn errors(&self) -> u32 {
        self.subtests.iter().map(|s| s.errors).sum()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.subtests.iter().map(|s| s.elapsed_secs).sum()
    }

    /// A test counts as skipped when none of its subtests ran.
    pub fn skipped(&self) -> bool {
        !self.subtests.is_empty() && self.subtests.iter().all(|s| s.skipped)
    }

    pub fn mark_skipped(&mut self) {
        for s in &mut self.subtests {
            s.skipped = true;
        }
    }
}

/// Status shown in the report, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Error,
    Skipped,
    Disabled,
    Normal,
}

impl RowStatus {
    pub fn classify(errors: u32, skipped: bool, disabled: bool) -> Self {
        if errors > 0 {
            Self::Error
        } else if skipped {
            Self::Skipped
        } else if disabled {
            Self::Disabled
        } else {
            Self::Normal
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Disabled => "disabled",
            Self::Normal => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub elapsed_secs: f64,
    pub errors: u32,
    pub status: RowStatus,
    pub time_warning: bool,
    /// Per-subtest rows are indented below their roll-up row.
    pub nested: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Local>,
    pub rows: Vec<ReportRow>,
    pub total_errors: u32,
    pub total_elapsed_secs: f64,
    pub warn_threshold_secs: f64,
    pub time_warnings: usize,
}

/// Combine all records into a report.
///
/// A test with several subtests gets a roll-up row followed by one row per subtest.
pub fn aggregate(records: &[TestRecord], warn_threshold_secs: f64) -> Report {
    let mut rows = Vec::new();

    for record in records {
        let elapsed = record.elapsed_secs();
        rows.push(ReportRow {
            label: record.label.clone(),
            elapsed_secs: elapsed,
            errors: record.errors(),
            status: RowStatus::classify(record.errors(), record.skipped(), record.disabled),
            time_warning: elapsed > warn_threshold_secs,
            nested: false,
        });

        if record.subtests.len() > 1 {
            for s in &record.subtests {
                rows.push(ReportRow {
                    label: s.label.clone(),
                    elapsed_secs: s.elapsed_secs,
                    errors: s.errors,
                    status: RowStatus::classify(s.errors, s.skipped, record.disabled),
                    time_warning: s.elapsed_secs > warn_threshold_secs,
                    nested: true,
                });
            }
        }
    }

    let time_warnings = rows.iter().filter(|r| r.time_warning && !r.nested).count();

    Report {
        generated_at: Local::now(),
        total_errors: records.iter().map(TestRecord::errors).sum(),
        total_elapsed_secs: records.iter().map(TestRecord::elapsed_secs).sum(),
        warn_threshold_secs,
        time_warnings,
        rows,
    }
}

impl Report {
    pub fn passed(&self) -> bool {
        self.total_errors == 0
    }

    /// Fixed-width table, one line per row. `!` marks a time warning.
    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|r| r.label.len() + if r.nested { 2 } else { 0 })
            .chain(std::iter::once("total".len()))
            .max()
            .unwrap_or(0);
        let rule = "_".repeat(width + 32);

        let mut lines = vec![
            format!("  {:<width$} {:>12} {:>6}  status", "test", "time (s)", "errors"),
            rule.clone(),
        ];
        lines.extend(self.rows.iter().map(|row| {
            let marker = if row.time_warning { '!' } else { ' ' };
            let indent = if row.nested { "  " } else { "" };
            format!(
                "{} {:<width$} {:>12.3e} {:>6}  {}",
                marker,
                format!("{}{}", indent, row.label),
                row.elapsed_secs,
                row.errors,
                row.status.as_str()
            )
        }));
        lines.push(rule);
        lines.push(format!(
            "  {:<width$} {:>12.3e} {:>6}",
            "total", self.total_elapsed_secs, self.total_errors
        ));
        lines.push(format!("  {:<width$} {:>12}", "", format_hms(self.total_elapsed_secs)));
        lines.push(match self.time_warnings {
            0 => "Encountered zero time warnings.".to_string(),
            1 => "Encountered 1 time warning.".to_string(),
            n => format!("Encountered {} time warnings.", n),
        });

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Closing line of a run.
    pub fn summary(&self) -> String {
        match self.total_errors {
            0 => "Encountered zero errors.".to_string(),
            1 => "Encountered 1 error.".to_string(),
            n => format!("Encountered {} errors.", n),
        }
    }
}

fn format_hms(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

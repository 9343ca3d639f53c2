//! Terminal output for a batch: a spinner while it runs and a coloured summary.
//!
//! Everything here writes to stderr. The spinner hides itself when stderr
//! is not a terminal, so redirected runs stay quiet.

use std::sync::Arc;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::error::SkimrunError;
use crate::runner::{BatchReport, Gauge};

/// Spinner showing how many items are running and how many were started.
pub struct BatchProgress {
    pb: ProgressBar,
    gauge: Arc<Gauge>,
}

impl BatchProgress {
    pub fn start(total: usize, budget: usize, gauge: Arc<Gauge>) -> Self {
        let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("budget {budget}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb, gauge }
    }

    /// Called after each submission returns.
    pub fn submitted(&self, label: &str) {
        self.pb.inc(1);
        self.pb
            .set_message(format!("running {} · {label}", self.gauge.running()));
    }

    pub fn draining(&self) {
        self.pb
            .set_message(format!("waiting for {} to finish", self.gauge.running()));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Print a short coloured summary of `report` to stderr.
pub fn print_summary(report: &BatchReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let dim = Style::new().dim();

    for outcome in report.failures() {
        eprintln!(
            "  {} {} ({})",
            red.apply_to("✗"),
            outcome.label,
            outcome.status
        );
    }

    let mark = if report.failed == 0 {
        green.apply_to("✓")
    } else {
        red.apply_to("✗")
    };
    eprintln!(
        "  {mark} {} ok, {} failed {}",
        report.succeeded,
        report.failed,
        dim.apply_to(format!(
            "(budget {}, peak {}, {} ms)",
            report.budget, report.peak_running, report.duration_ms
        ))
    );
}

/// Print `report` as pretty JSON to stdout.
pub fn print_json(report: &BatchReport) -> Result<(), SkimrunError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

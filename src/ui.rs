//! Terminal output: a spinner while a reconciliation waits, coloured result
//! lines afterwards.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::error::RelytError;

/// Spinner shown for the duration of one command.
pub struct Progress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl Progress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        // The template is a literal; fall back to the default look if it is ever rejected.
        let template = "{spinner:.cyan} {msg} {elapsed:.dim}";
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Stop the spinner and print the result as pretty JSON.
    pub fn succeed(&self, summary: &str, result: &impl Serialize) {
        self.pb.finish_and_clear();
        println!("  {} {summary}", self.green.apply_to("✓"));
        println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
    }

    /// Print follow-up steps that failed after the primary change landed.
    pub fn partial(&self, failures: &[String]) {
        for failure in failures {
            eprintln!("  {} {failure}", self.yellow.apply_to("!"));
        }
    }

    pub fn fail(&self, err: &RelytError) {
        self.pb.finish_and_clear();
        let mark = if err.is_interrupted() {
            self.yellow.apply_to("⏹")
        } else {
            self.red.apply_to("✗")
        };
        eprintln!("  {mark} {err}");
    }
}

//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: a record counter for the polling loop and spinner lines for
//! the schema generator's stages. Non-TTY mode: hidden bars, logs only.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const RECORDS_TEMPLATE: &str =
    "{prefix:<10.cyan.bold} {bar:30.green/dim} {pos:>6}/{len:6} {per_sec:>10.dim} {elapsed:>4}";
const STEP_TEMPLATE: &str = "{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}";

fn style(template: &str) -> ProgressStyle {
    // Templates are compile-time constants
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Owns the `MultiProgress` every bar and the TTY logger draw through.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Draw only when stderr is a terminal.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Never draws (tests, piped output)
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Counter of records fetched towards `total`.
    pub fn count_bar(&self, name: &str, total: u64) -> ProgressBar {
        self.add(name, ProgressBar::new(total), RECORDS_TEMPLATE)
    }

    /// Spinner for one stage; the caller sets the message per item and
    /// calls `finish_and_clear` when the stage ends.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        let pb = self.add(name, ProgressBar::new_spinner(), STEP_TEMPLATE);
        if self.is_tty {
            pb.enable_steady_tick(Duration::from_millis(80));
        }
        pb
    }

    fn add(&self, name: &str, pb: ProgressBar, template: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(pb);
        pb.set_style(style(template));
        pb.set_prefix(name.to_string());
        pb
    }

    /// Print a line without tearing active bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// For the log bridge
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgress = Arc<ProgressContext>;

/// `1234567` as `1,234,567`
pub fn fmt_num(n: usize) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.char_indices() {
        if i > 0 && (i + 3 - head) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

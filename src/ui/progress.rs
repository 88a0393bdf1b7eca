//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::cache::CopyObserver;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// A phase spinner; prints plain lines when not interactive
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(message),
            None if self.interactive => println!("{} {}", style("✓").green(), message),
            None => println!("{} {}", style("[OK]").green(), message),
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.error(message),
            None if self.interactive => println!("{} {}", style("✗").red(), message),
            None => println!("{} {}", style("[FAIL]").red(), message),
        }
    }
}

/// Progress bar for the shadow copy refresh.
///
/// Shows an indicatif bar in interactive mode and a single summary line
/// otherwise.
pub struct CopyProgress {
    bar: Option<ProgressBar>,
}

impl CopyProgress {
    pub fn new(ctx: &UiContext) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(Self::bar_style());
            bar
        });
        Self { bar }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {spinner:.blue} Mirroring  {bar:24.blue/dim} {pos}/{len} {msg:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .progress_chars("━╸─")
    }
}

impl CopyObserver for CopyProgress {
    fn start(&self, total: usize) {
        match self.bar {
            Some(ref bar) => {
                bar.set_length(total as u64);
                bar.enable_steady_tick(std::time::Duration::from_millis(120));
            }
            None => println!("{} Mirroring {} files", style("...").dim(), total),
        }
    }

    fn copied(&self, file: &Path) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
            if let Some(name) = file.file_name() {
                bar.set_message(name.to_string_lossy().into_owned());
            }
        }
    }

    fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

//! Terminal output for gococo
//!
//! Uses `cliclack` for step logging and spinners and `indicatif` for the
//! mirror copy bar, with plain line output when not attached to a terminal
//! (CI, pipes).
//!
//! # Example
//!
//! ```rust,ignore
//! use gococo::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Resolving packages...");
//! // ... do work ...
//! spinner.stop("Resolved 12 packages");
//!
//! ui::step_ok_detail(&ctx, "Shadow copy refreshed", "42 files");
//! ```

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_success, remark, step_info, step_ok_detail, step_warn,
};
pub use progress::{CopyProgress, TaskSpinner};
pub use theme::{init_theme, GococoTheme};

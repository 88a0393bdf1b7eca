//! cliclack theme for build output
//!
//! gococo never prompts; it only draws spinners and log lines. The left bar
//! stays dim so the step symbols carry the state, and the spinner uses
//! braille frames that stay legible in narrow CI log viewers.

use cliclack::ThemeState;
use console::{style, Style};

const SPINNER_FRAMES: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏✓";

/// gococo's theme
#[derive(Debug, Clone, Default)]
pub struct GococoTheme;

impl cliclack::Theme for GococoTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue().bold(),
            ThemeState::Error(_) => Style::new().red().bold(),
            ThemeState::Cancel => Style::new().yellow(),
            ThemeState::Submit => Style::new().green(),
        }
    }

    fn info_symbol(&self) -> String {
        style("i").blue().to_string()
    }

    fn warning_symbol(&self) -> String {
        style("!").yellow().bold().to_string()
    }

    fn spinner_chars(&self) -> String {
        SPINNER_FRAMES.to_string()
    }
}

/// Install the theme for all cliclack output
pub fn init_theme() {
    cliclack::set_theme(GococoTheme);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliclack::Theme;

    #[test]
    fn bar_is_dim_unless_failed() {
        let theme = GococoTheme;
        assert_eq!(theme.bar_color(&ThemeState::Active), Style::new().dim());
        assert_eq!(theme.bar_color(&ThemeState::Submit), Style::new().dim());
        assert_eq!(theme.state_symbol_color(&ThemeState::Submit), Style::new().green());
    }

    #[test]
    fn spinner_ends_on_check_mark() {
        let frames = GococoTheme.spinner_chars();
        assert_eq!(frames.chars().last(), Some('✓'));
        assert!(frames.chars().count() > 2);
    }
}

//! Theme - colors and styles shared by all views

use ratatui::style::{Color, Modifier, Style};

/// Color palette
pub struct Theme {
    // Primary palette
    pub violet: Color,
    pub amber: Color,
    pub cyan: Color,
    pub background: Color,
    pub white: Color,

    // Status colors
    pub success_green: Color,
    pub warning_orange: Color,
    pub error_red: Color,

    // Dimmed versions
    pub dim_violet: Color,
    pub dim_cyan: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            violet: Color::Rgb(138, 43, 226), // #8A2BE2
            amber: Color::Rgb(255, 191, 0),   // #FFBF00
            cyan: Color::Rgb(0, 255, 255),    // #00FFFF
            background: Color::Rgb(13, 17, 23),
            white: Color::Rgb(230, 237, 243),

            success_green: Color::Rgb(63, 185, 80),
            warning_orange: Color::Rgb(210, 153, 34),
            error_red: Color::Rgb(248, 81, 73),

            dim_violet: Color::Rgb(88, 28, 143),
            dim_cyan: Color::Rgb(0, 153, 153),
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Text
    // ─────────────────────────────────────────────────────────────────────

    pub fn text(&self) -> Style {
        Style::default().fg(self.white)
    }

    pub fn dimmed(&self) -> Style {
        Style::default().fg(Color::Rgb(128, 128, 128))
    }

    /// Table header row and view titles
    pub fn header(&self) -> Style {
        Style::default().fg(self.violet).add_modifier(Modifier::BOLD)
    }

    /// Key hints in the legend
    pub fn accent(&self) -> Style {
        Style::default().fg(self.amber)
    }

    pub fn highlight(&self) -> Style {
        Style::default().fg(self.cyan).add_modifier(Modifier::BOLD)
    }

    pub fn success(&self) -> Style {
        Style::default().fg(self.success_green)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning_orange)
    }

    pub fn error(&self) -> Style {
        Style::default()
            .fg(self.error_red)
            .add_modifier(Modifier::BOLD)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection and borders
    // ─────────────────────────────────────────────────────────────────────

    /// Selected table row, focused form item or button
    pub fn selected(&self) -> Style {
        Style::default()
            .fg(self.background)
            .bg(self.cyan)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.dim_violet)
    }

    pub fn focused_border(&self) -> Style {
        Style::default().fg(self.violet).add_modifier(Modifier::BOLD)
    }

    pub fn overlay_border(&self) -> Style {
        Style::default().fg(self.amber)
    }

    pub fn input(&self) -> Style {
        Style::default().fg(self.white).bg(Color::Rgb(33, 38, 45))
    }

    pub fn border_for(&self, focused: bool) -> Style {
        if focused {
            self.focused_border()
        } else {
            self.border()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_defaults() {
        let theme = Theme::new();
        assert_eq!(theme.violet, Color::Rgb(138, 43, 226));
        assert_eq!(theme.amber, Color::Rgb(255, 191, 0));
    }

    #[test]
    fn test_selected_is_readable() {
        let theme = Theme::new();
        let style = theme.selected();
        assert_eq!(style.bg, Some(theme.cyan));
        assert_ne!(style.fg, style.bg);
    }

    #[test]
    fn test_border_for_focus() {
        let theme = Theme::new();
        assert_eq!(theme.border_for(true), theme.focused_border());
        assert_eq!(theme.border_for(false), theme.border());
    }
}

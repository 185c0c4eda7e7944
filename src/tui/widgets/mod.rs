//! TUI Widgets - reusable building blocks for view contents

pub mod form;
pub mod table;

pub use form::{Form, FormEvent, FormItem};
pub use table::SelectableTable;

/// Common widget utilities
pub mod utils {
    use ratatui::layout::{Constraint, Flex, Layout, Rect};

    /// A rect of `percent_x` x `percent_y` centered in `area`
    pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
        let [row] = Layout::vertical([Constraint::Percentage(percent_y)])
            .flex(Flex::Center)
            .areas(area);
        let [cell] = Layout::horizontal([Constraint::Percentage(percent_x)])
            .flex(Flex::Center)
            .areas(row);
        cell
    }

    /// A rect of fixed size centered in `area`, clamped to fit
    pub fn centered_fixed(width: u16, height: u16, area: Rect) -> Rect {
        let width = width.min(area.width);
        let height = height.min(area.height);
        Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        }
    }

    /// Truncate string with ellipsis, on char boundaries
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else if max_len <= 3 {
            s.chars().take(max_len).collect()
        } else {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        }
    }

    /// Width in cells of the widest line of `text`
    pub fn text_width(text: &str) -> usize {
        text.lines().map(|l| l.chars().count()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use ratatui::layout::Rect;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hi", 2), "hi");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_centered_fixed_clamps() {
        let area = Rect::new(0, 0, 20, 10);
        assert_eq!(centered_fixed(10, 4, area), Rect::new(5, 3, 10, 4));
        assert_eq!(centered_fixed(50, 50, area), area);
    }

    #[test]
    fn test_centered_rect_inside_area() {
        let area = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(60, 50, area);
        assert_eq!(inner.width, 60);
        assert_eq!(inner.height, 25);
        assert!(inner.x > 0 && inner.y > 0);
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("ab\nabcd\n"), 4);
        assert_eq!(text_width(""), 0);
    }
}

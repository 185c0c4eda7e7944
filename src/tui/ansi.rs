//! ANSI decoding into a styled scrollback
//!
//! [`AnsiDecoder`] wraps a `vte` parser; parser state persists across
//! [`feed`](AnsiDecoder::feed) calls, so an escape sequence or a UTF-8
//! character split across two chunks decodes the same as if unsplit.
//!
//! The scrollback is line oriented: it tracks a cursor column on the last
//! line only. Carriage return, backspace, cursor left/right/column moves,
//! erase-in-line, insert/delete character and SGR styling are honored;
//! vertical cursor movement is ignored. Lines are `cols` cells wide: the
//! cursor never moves past the last column and printing beyond it wraps
//! onto a new line.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use vte::{Params, Parser, Perform};

const TAB_WIDTH: usize = 8;

/// Lines kept before the oldest are discarded
pub const DEFAULT_MAX_LINES: usize = 5000;

/// Line width when none is given
pub const DEFAULT_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    style: Style,
}

impl Cell {
    fn blank() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

/// Styled lines with a cursor on the last line
#[derive(Debug, Clone, PartialEq)]
pub struct Scrollback {
    lines: Vec<Vec<Cell>>,
    /// Column of the next print; equals `cols` after the last column was
    /// written, so the following print wraps
    cursor: usize,
    style: Style,
    max_lines: usize,
    cols: usize,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES, DEFAULT_WIDTH)
    }
}

impl Scrollback {
    pub fn new(max_lines: usize, cols: usize) -> Self {
        Self {
            lines: vec![Vec::new()],
            cursor: 0,
            style: Style::default(),
            max_lines: max_lines.max(1),
            cols: cols.max(1),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Change the wrap width for lines written from now on
    pub fn set_cols(&mut self, cols: usize) {
        self.cols = cols.max(1);
        self.cursor = self.cursor.min(self.cols);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    /// Plain text of every line, trailing blanks trimmed
    pub fn text_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| {
                let s: String = line.iter().map(|c| c.ch).collect();
                s.trim_end().to_string()
            })
            .collect()
    }

    /// Styled lines for rendering
    pub fn lines(&self) -> Vec<Line<'static>> {
        self.lines
            .iter()
            .map(|cells| {
                let mut spans: Vec<Span<'static>> = Vec::new();
                let mut text = String::new();
                let mut style = cells.first().map(|c| c.style).unwrap_or_default();
                for cell in cells {
                    if cell.style != style {
                        spans.push(Span::styled(std::mem::take(&mut text), style));
                        style = cell.style;
                    }
                    text.push(cell.ch);
                }
                if !text.is_empty() {
                    spans.push(Span::styled(text, style));
                }
                Line::from(spans)
            })
            .collect()
    }

    /// Append a plain line of text, e.g. a status note
    pub fn push_note(&mut self, text: &str) {
        if !self.current().is_empty() {
            self.newline();
        }
        for ch in text.chars() {
            self.put_char(ch);
        }
        self.newline();
    }

    fn current(&mut self) -> &mut Vec<Cell> {
        if self.lines.is_empty() {
            self.lines.push(Vec::new());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn last_col(&self) -> usize {
        self.cols - 1
    }

    /// Move the cursor to `col`, limited to the last column
    fn move_to(&mut self, col: usize) {
        self.cursor = col.min(self.last_col());
    }

    fn put_char(&mut self, ch: char) {
        if self.cursor >= self.cols {
            self.newline();
        }
        let cursor = self.cursor;
        let cell = Cell {
            ch,
            style: self.style,
        };
        let line = self.current();
        if cursor < line.len() {
            line[cursor] = cell;
        } else {
            line.resize(cursor, Cell::blank());
            line.push(cell);
        }
        self.cursor += 1;
    }

    fn newline(&mut self) {
        self.lines.push(Vec::new());
        self.cursor = 0;
        if self.lines.len() > self.max_lines {
            let excess = self.lines.len() - self.max_lines;
            self.lines.drain(..excess);
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let cursor = self.cursor;
        let line = self.current();
        match mode {
            0 => line.truncate(cursor),
            1 => {
                for cell in line.iter_mut().take(cursor + 1) {
                    *cell = Cell::blank();
                }
            }
            _ => line.clear(),
        }
    }

    fn delete_chars(&mut self, n: usize) {
        let cursor = self.cursor;
        let line = self.current();
        if cursor < line.len() {
            let end = (cursor + n).min(line.len());
            line.drain(cursor..end);
        }
    }

    fn insert_blanks(&mut self, n: usize) {
        let (cursor, cols) = (self.cursor, self.cols);
        let line = self.current();
        if cursor < line.len() {
            let n = n.min(cols - cursor);
            line.splice(cursor..cursor, std::iter::repeat(Cell::blank()).take(n));
            line.truncate(cols);
        }
    }

    fn clear(&mut self) {
        self.lines = vec![Vec::new()];
        self.cursor = 0;
    }

    fn apply_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.style = Style::default();
            return;
        }
        let mut iter = params.iter().copied();
        while let Some(p) = iter.next() {
            self.style = match p {
                0 => Style::default(),
                1 => self.style.add_modifier(Modifier::BOLD),
                2 => self.style.add_modifier(Modifier::DIM),
                3 => self.style.add_modifier(Modifier::ITALIC),
                4 => self.style.add_modifier(Modifier::UNDERLINED),
                5 => self.style.add_modifier(Modifier::SLOW_BLINK),
                7 => self.style.add_modifier(Modifier::REVERSED),
                9 => self.style.add_modifier(Modifier::CROSSED_OUT),
                22 => self
                    .style
                    .remove_modifier(Modifier::BOLD | Modifier::DIM),
                23 => self.style.remove_modifier(Modifier::ITALIC),
                24 => self.style.remove_modifier(Modifier::UNDERLINED),
                25 => self.style.remove_modifier(Modifier::SLOW_BLINK),
                27 => self.style.remove_modifier(Modifier::REVERSED),
                29 => self.style.remove_modifier(Modifier::CROSSED_OUT),
                30..=37 => self.style.fg(Color::Indexed((p - 30) as u8)),
                39 => self.style.fg(Color::Reset),
                40..=47 => self.style.bg(Color::Indexed((p - 40) as u8)),
                49 => self.style.bg(Color::Reset),
                90..=97 => self.style.fg(Color::Indexed((p - 90 + 8) as u8)),
                100..=107 => self.style.bg(Color::Indexed((p - 100 + 8) as u8)),
                38 | 48 => {
                    let color = match iter.next() {
                        Some(5) => iter.next().map(|n| Color::Indexed(n as u8)),
                        Some(2) => match (iter.next(), iter.next(), iter.next()) {
                            (Some(r), Some(g), Some(b)) => Some(Color::Rgb(r as u8, g as u8, b as u8)),
                            _ => None,
                        },
                        _ => None,
                    };
                    match (p, color) {
                        (38, Some(c)) => self.style.fg(c),
                        (_, Some(c)) => self.style.bg(c),
                        _ => self.style,
                    }
                }
                _ => self.style,
            };
        }
    }
}

impl Perform for Scrollback {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | 0x0b | 0x0c => self.newline(),
            b'\r' => self.cursor = 0,
            // After the last column was written the cursor sits on it
            0x08 => self.move_to(self.cursor.min(self.last_col()).saturating_sub(1)),
            b'\t' => {
                let next = ((self.cursor / TAB_WIDTH + 1) * TAB_WIDTH).min(self.last_col());
                let line = self.current();
                if line.len() < next {
                    line.resize(next, Cell::blank());
                }
                self.cursor = self.cursor.max(next);
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore || !intermediates.is_empty() {
            return;
        }
        let values: Vec<u16> = params.iter().flat_map(|p| p.iter().copied()).collect();
        let count = values.first().copied().filter(|n| *n > 0).unwrap_or(1) as usize;
        match action {
            'm' => self.apply_sgr(&values),
            'K' => self.erase_in_line(values.first().copied().unwrap_or(0)),
            'J' if matches!(values.first(), Some(2) | Some(3)) => self.clear(),
            'C' => self.move_to(self.cursor.saturating_add(count)),
            'D' => self.move_to(self.cursor.min(self.last_col()).saturating_sub(count)),
            'G' => self.move_to(count - 1),
            'P' => self.delete_chars(count),
            '@' => self.insert_blanks(count),
            _ => {}
        }
    }
}

/// Stateful decoder feeding chunks into a [`Scrollback`]
pub struct AnsiDecoder {
    parser: Parser,
}

impl Default for AnsiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsiDecoder {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8], scrollback: &mut Scrollback) {
        self.parser.advance(scrollback, bytes);
    }
}

use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Color as TermColor, Stylize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ACCENT: TermColor = TermColor::Rgb {
    r: 95,
    g: 175,
    b: 255,
};
const MUTED: TermColor = TermColor::Rgb {
    r: 128,
    g: 128,
    b: 128,
};

/// Cells wider than this are clipped in tables.
const MAX_CELL_WIDTH: usize = 48;

pub fn admin_styles() -> Styles {
    let heading = Style::new()
        .bold()
        .fg_color(Some(Color::Ansi(AnsiColor::Blue)));
    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

#[derive(Debug, Clone, Copy)]
pub enum Tone {
    Done,
    Notice,
    Failure,
}

/// One status line. Failures go to stderr.
pub fn report(tone: Tone, message: &str) {
    match tone {
        Tone::Done => println!("{} {}", "✓".green().bold(), message),
        Tone::Notice => println!("{} {}", "!".yellow().bold(), message.yellow()),
        Tone::Failure => eprintln!("{} {}", "✗".red().bold(), message.red()),
    }
}

/// Titled block of `key: value` lines with keys aligned.
pub struct Panel {
    title: String,
    fields: Vec<(String, String)>,
}

impl Panel {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn print(&self) {
        println!();
        println!("{}", format!("▍{}", self.title).with(ACCENT).bold());
        if self.fields.is_empty() {
            println!("  {}", "nothing to show".with(MUTED).italic());
        }
        let key_width = self.fields.iter().map(|(k, _)| k.width()).max().unwrap_or(0);
        for (key, value) in &self.fields {
            let padding = " ".repeat(key_width - key.width());
            println!("  {}{}  {}", key.as_str().with(MUTED), padding, value);
        }
        println!();
    }
}

/// Plain column table. Rows shorter than the header are padded with blanks.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells.into_iter().map(|c| clip(&c, MAX_CELL_WIDTH)).collect());
    }

    fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.width())
                    .fold(header.width(), usize::max)
            })
            .collect()
    }

    /// Lines of the table without colors, header and rule first.
    pub fn render(&self) -> Vec<String> {
        let widths = self.column_widths();
        let line = |cells: &[String]| {
            widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{}{}", cell, " ".repeat(width - cell.width()))
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };
        let rule = widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ");

        let mut lines = vec![line(&self.headers), rule];
        lines.extend(self.rows.iter().map(|row| line(row)));
        lines
    }

    pub fn print(&self) {
        let mut lines = self.render().into_iter();
        if let Some(header) = lines.next() {
            println!("{}", header.with(ACCENT).bold());
        }
        if let Some(rule) = lines.next() {
            println!("{}", rule.with(MUTED));
        }
        for line in lines {
            println!("{}", line);
        }
    }
}

/// Cuts `text` to at most `max` display columns, marking the cut with `…`.
fn clip(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut clipped = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        clipped.push(ch);
        used += w;
    }
    clipped.push('…');
    clipped
}

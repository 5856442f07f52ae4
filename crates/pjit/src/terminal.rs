//! Terminal output for the CLI: progress bar, status lines, result tables.

use std::fmt::{self, Write as _};
use std::io::{self, Write};

use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};

/// Bar over `total` items, or a hidden one when `visible` is false.
pub fn progress_bar(total: u64, label: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total).with_message(label);
    if let Ok(template) = ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/dim}] {pos}/{len}") {
        bar.set_style(template.progress_chars("━╸━"));
    }
    bar
}

/// Kind of a status line on stderr.
#[derive(Clone, Copy, Debug)]
pub enum Status {
    Info,
    Done,
    Failed,
    Warn,
}

impl Status {
    fn mark(self) -> StyledObject<&'static str> {
        match self {
            Self::Info => style("→").cyan(),
            Self::Done => style("✓").green().bold(),
            Self::Failed => style("✗").red().bold(),
            Self::Warn => style("!").yellow().bold(),
        }
    }
}

pub fn status(kind: Status, message: impl fmt::Display) {
    eprintln!("{} {message}", kind.mark());
}

/// Bold section title on stdout.
pub fn header(message: impl fmt::Display) {
    println!("\n{}", style(message).bold());
}

#[derive(Clone, Copy, Debug, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

/// Markdown table, one column per `(title, alignment)`.
pub struct Table {
    columns: Vec<(String, Alignment)>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[(&str, Alignment)]) -> Self {
        Self {
            columns: columns.iter().map(|&(title, align)| (title.to_string(), align)).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, (title, _))| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .fold(title.len(), usize::max)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();

        out.push('|');
        for ((title, _), w) in self.columns.iter().zip(&widths) {
            let _ = write!(out, " {title:^w$} |");
        }
        out.push_str("\n|");
        for ((_, align), &w) in self.columns.iter().zip(&widths) {
            let rule = "-".repeat(w + 1);
            match align {
                Alignment::Left => out.push_str(&format!(":{rule}|")),
                Alignment::Right => out.push_str(&format!("{rule}:|")),
            }
        }
        out.push('\n');

        for row in &self.rows {
            out.push('|');
            for (cell, ((_, align), w)) in row.iter().zip(self.columns.iter().zip(&widths)) {
                let _ = match align {
                    Alignment::Left => write!(out, " {cell:<w$} |"),
                    Alignment::Right => write!(out, " {cell:>w$} |"),
                };
            }
            out.push('\n');
        }
        out
    }

    pub fn print(&self) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(self.render().as_bytes());
        let _ = stdout.flush();
    }
}

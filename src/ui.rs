use console::{strip_ansi_codes, Term};
use owo_colors::OwoColorize;
use unicode_width::UnicodeWidthStr;

use facefolio_protocol::common::{Image, Person};

use std::default::Default;

/// Terminal output helpers
pub struct UI {
    term: Term,
}

impl UI {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Helper method to conditionally apply color based on terminal support
    fn colorize<F>(&self, text: &str, color_fn: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.supports_color() {
            color_fn(text)
        } else {
            text.to_string()
        }
    }

    pub fn success(&self, message: &str) {
        let output = self.colorize(message, |m| m.green().bold().to_string());
        println!("{}", output);
    }

    pub fn error(&self, message: &str) {
        let output = self.colorize(message, |m| m.red().bold().to_string());
        eprintln!("{}", output);
    }

    pub fn warning(&self, message: &str) {
        let output = self.colorize(message, |m| m.yellow().bold().to_string());
        println!("{}", output);
    }

    pub fn info(&self, message: &str) {
        let output = self.colorize(message, |m| m.blue().bold().to_string());
        println!("{}", output);
    }

    /// Format server connection status with appropriate color (if supported)
    pub fn format_server_status(&self, connected: bool) -> String {
        let text = if connected {
            "Connected"
        } else {
            "Connection failed"
        };
        if self.supports_color() {
            if connected {
                text.green().to_string()
            } else {
                text.red().to_string()
            }
        } else {
            text.to_string()
        }
    }

    /// Identification state of an image, colored
    pub fn format_identity(&self, image: &Image) -> String {
        let text = identity_label(image);
        if !self.supports_color() {
            return text;
        }
        if image.is_identified {
            text.green().to_string()
        } else if image.has_face {
            text.yellow().to_string()
        } else {
            text.dimmed().to_string()
        }
    }

    pub fn blank_line(&self) {
        println!();
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        let term_width = self.width();
        let title_len = title.width() + 4; // 2 spaces on each side
        let line_len = if term_width > title_len {
            (term_width - title_len) / 2
        } else {
            0
        };

        let line = "═".repeat(line_len);

        println!();
        if self.supports_color() {
            println!("{} {} {}", line.cyan(), title.cyan().bold(), line.cyan());
        } else {
            println!("{} {} {}", line, title, line);
        }
        println!();
    }

    /// Print a separator line
    pub fn separator(&self) {
        let width = self.width();
        let line = "─".repeat(width.min(80));
        if self.supports_color() {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }

    /// Print a status with colored indicator
    pub fn status(&self, label: &str, status: &str, is_good: bool) {
        if self.supports_color() {
            if is_good {
                println!("{}: {}", label.bold(), status.green());
            } else {
                println!("{}: {}", label.bold(), status.red());
            }
        } else {
            println!("{}: {}", label, status);
        }
    }

    /// Create a card-style display for information
    pub fn card(&self, title: &str, content: Vec<(&str, String)>) {
        let term_width = self.width();
        let card_width = term_width
            .saturating_sub(4) // Leave more space for terminal margins
            .clamp(50, 80);

        let supports_color = self.supports_color();

        println!("╭{}╮", "─".repeat(card_width - 2));
        let title_width = title.width();
        let title_spaces = card_width.saturating_sub(title_width + 4);
        if supports_color {
            println!("│ {} {}│", title.cyan().bold(), " ".repeat(title_spaces));
        } else {
            println!("│ {} {}│", title, " ".repeat(title_spaces));
        }
        println!("├{}┤", "─".repeat(card_width - 2));

        for (label, value) in content {
            // Strip ANSI codes for width calculations
            let label_plain = strip_ansi_codes(label);
            let value_plain = strip_ansi_codes(&value);

            let content_width = label_plain.width() + value_plain.width() + 4; // ": " + 2 spaces padding

            let spaces = if content_width < card_width - 1 {
                card_width - content_width - 1
            } else {
                1
            };

            if supports_color {
                println!("│ {}: {}{}│", label.dimmed(), value, " ".repeat(spaces));
            } else {
                println!("│ {}: {}{}│", label, value, " ".repeat(spaces));
            }
        }

        println!("╰{}╯", "─".repeat(card_width - 2));
        println!();
    }

    /// Print rows under a header, columns padded to their widest cell
    pub fn table(&self, headers: &[&str], rows: Vec<Vec<String>>) {
        for line in layout_table(headers, &rows) {
            println!("{}", line);
        }
    }

    pub fn image_table(&self, images: &[Image]) {
        if images.is_empty() {
            self.info("No images on this page");
            return;
        }

        let rows = images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                vec![
                    (idx + 1).to_string(),
                    image.id.to_string(),
                    image.display_name().to_string(),
                    image.face_count.to_string(),
                    self.format_identity(image),
                ]
            })
            .collect();
        self.table(&["#", "ID", "File", "Faces", "Status"], rows);
    }

    pub fn people_table(&self, people: &[Person]) {
        if people.is_empty() {
            self.info("No people found");
            return;
        }

        let rows = people
            .iter()
            .enumerate()
            .map(|(idx, person)| {
                vec![
                    (idx + 1).to_string(),
                    person.id.to_string(),
                    person.name.clone(),
                    person.image_count.to_string(),
                ]
            })
            .collect();
        self.table(&["#", "ID", "Name", "Images"], rows);
    }

    /// "Page 2 of 5 (93 total)"
    pub fn page_footer(&self, page: u32, total_pages: u32, total_count: u64) {
        let text = format_page_footer(page, total_pages, total_count);
        let output = self.colorize(&text, |m| m.dimmed().to_string());
        println!();
        println!("{}", output);
    }

    /// Get terminal width for responsive layout
    pub fn width(&self) -> usize {
        self.term.size().1 as usize
    }

    /// Check if terminal supports color
    pub fn supports_color(&self) -> bool {
        self.term.features().colors_supported()
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

pub fn identity_label(image: &Image) -> String {
    if image.is_identified {
        match &image.person {
            Some(person) => format!("Identified ({})", person.name),
            None => "Identified".to_string(),
        }
    } else if image.has_face {
        "Unidentified".to_string()
    } else {
        "No face".to_string()
    }
}

pub fn format_page_footer(page: u32, total_pages: u32, total_count: u64) -> String {
    format!(
        "Page {} of {} ({} total)",
        page,
        total_pages.max(1),
        total_count
    )
}

fn layout_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let cell_width = strip_ansi_codes(cell).width();
            match widths.get_mut(idx) {
                Some(width) => *width = (*width).max(cell_width),
                None => widths.push(cell_width),
            }
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let pad = widths[idx].saturating_sub(strip_ansi_codes(cell).width());
                format!("{}{}", cell, " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines
}

/// Create a progress bar with modern styling
pub fn create_progress_bar(len: u64, message: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(len);
    let style = indicatif::ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{elapsed_precise:.dim}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

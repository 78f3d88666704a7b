use crate::ast::SourceMap;
use super::Diagnostic;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[LOX-P001]: message"
        let heading = match d.code {
            Some(code) => format!("error[{code}]"),
            None => "error".to_string(),
        };
        out.push_str(&format!("{}: {}\n", self.bold_red(&heading), self.bold(&d.message)));

        match (d.labels.first(), &d.source) {
            (Some(label), Some(source)) => {
                let map = SourceMap::new(source);
                let (line, col) = map.lookup(label.span.start);
                let line_text = map.line_text(source, line);

                // "  --> line:col"
                out.push_str(&format!("  {} {}:{}\n", self.cyan("-->"), line, col));

                let gutter = line.to_string().len();
                let pipe = self.cyan("|");
                let pad = " ".repeat(gutter);

                out.push_str(&format!("{pad} {pipe}\n"));
                let line_num = self.cyan(&format!("{line:>gutter$}"));
                out.push_str(&format!("{line_num} {pipe} {line_text}\n"));

                // Carets stop at the end of the line for spans that run on.
                let span_start_in_line = col.saturating_sub(1);
                let room = line_text.len().saturating_sub(span_start_in_line).max(1);
                let span_len = label.span.end.saturating_sub(label.span.start).clamp(1, room);
                let carets = self.bold_red(&"^".repeat(span_len));
                let indent = " ".repeat(span_start_in_line);
                if label.message.is_empty() {
                    out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
                } else {
                    out.push_str(&format!("{pad} {pipe} {indent}{carets} {}\n",
                        self.bold_red(&label.message)));
                }

                out.push_str(&format!("{pad} {pipe}\n"));
            }
            // Line-only errors: show the whole line.
            (None, Some(source)) => {
                if let Some(line) = d.line {
                    let map = SourceMap::new(source);
                    let line_text = map.line_text(source, line);
                    let gutter = line.to_string().len();
                    let pipe = self.cyan("|");
                    out.push_str(&format!("  {} line {}\n", self.cyan("-->"), line));
                    out.push_str(&format!("{} {pipe} {line_text}\n", self.cyan(&format!("{line:>gutter$}"))));
                }
            }
            _ => {}
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} suggestion: {}\n", self.dim("="), suggestion));
        }

        out
    }
}

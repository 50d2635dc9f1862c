use std::path::Path;

use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

use crate::error::{ImpactError, Result};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

/// A titled block of content within a [`Report`].
#[derive(Debug, Clone)]
pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            content: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn add_content(&mut self, content: Markup) {
        self.content.push(content);
    }

    /// Embed a plot as an inline `<div>`; the page loads plotly.js once.
    pub fn add_plot(&mut self, plot: Plot) {
        let div_id = format!(
            "plot-{}-{}",
            self.title.to_lowercase().replace(' ', "-"),
            self.content.len()
        );
        self.content
            .push(PreEscaped(plot.to_inline_html(Some(div_id.as_str()))));
    }

    fn render(&self) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for block in &self.content {
                    div class="block" { (block) }
                }
            }
        }
    }
}

/// Standalone HTML report.
#[derive(Debug, Clone)]
pub struct Report {
    software: String,
    version: String,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software: &str, version: &str, title: &str) -> Self {
        Self {
            software: software.to_string(),
            version: version.to_string(),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn render(&self) -> Markup {
        let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em auto; max-width: 1100px; }
                        table { border-collapse: collapse; margin: 1em 0; }
                        th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
                        th:first-child, td:first-child { text-align: left; }
                        tr.winner { font-weight: bold; background-color: #eef7ee; }
                        .block { margin-bottom: 1.5em; }"
                    }
                }
                body {
                    header {
                        h1 { (self.title) }
                        p { (self.software) " v" (self.version) " | generated " (generated) }
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.render().into_string()).map_err(|source| ImpactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_renders_sections_in_order() {
        let mut report = Report::new("impact", "0.1.0", "Training Report");
        let mut first = ReportSection::new("Classification");
        first.add_content(html! { p { "first" } });
        report.add_section(first);
        report.add_section(ReportSection::new("Regression"));

        let page = report.render().into_string();
        let a = page.find("Classification").unwrap();
        let b = page.find("Regression").unwrap();
        assert!(a < b);
        assert!(page.contains("<p>first</p>"));
    }
}

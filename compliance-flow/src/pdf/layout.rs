use tracing::debug;

use super::PdfStyle;
use super::metrics::{FontWeight, text_width_mm, wrap_text};
use crate::report::SpecificGuidelineResult;

const HEADER_GREY: u8 = 150;
const TITLE_GREY: u8 = 40;
const BODY_SIZE: f32 = 11.0;
const HEADING_SIZE: f32 = 16.0;
const SECTION_SIZE: f32 = 18.0;
const BULLET_INDENT: f32 = 5.0;

/// One positioned drawing primitive. Coordinates are millimetres from the
/// top-left corner of the page; text `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        weight: FontWeight,
        grey: u8,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
        width: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = (f32, &str)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { y, text, .. } => Some((*y, text.as_str())),
            DrawOp::Rule { .. } => None,
        })
    }
}

/// Output of the layout pass. The page count is only final here, so the
/// footers are stamped by [`LaidOutReport::finalize`].
#[derive(Debug, Clone)]
pub struct LaidOutReport {
    pub program_name: String,
    pub style: PdfStyle,
    pub pages: Vec<Page>,
}

/// A report with every footer in place, ready to be written.
#[derive(Debug, Clone)]
pub struct FinishedReport {
    pub program_name: String,
    pub style: PdfStyle,
    pub pages: Vec<Page>,
}

impl FinishedReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl LaidOutReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finalize(self, year: i32) -> FinishedReport {
        let total = self.pages.len();
        let mut pages = self.pages;
        for (index, page) in pages.iter_mut().enumerate() {
            let footer = format!(
                "Page {} of {} | Copyright © {} {}",
                index + 1,
                total,
                year,
                self.style.brand
            );
            let width = text_width_mm(&footer, FontWeight::Regular, 10.0);
            page.ops.push(DrawOp::Text {
                x: (self.style.page_width - width) / 2.0,
                y: self.style.page_height - 10.0,
                text: footer,
                size: 10.0,
                weight: FontWeight::Regular,
                grey: HEADER_GREY,
            });
        }

        debug!(pages = total, "Stamped footers");
        FinishedReport {
            program_name: self.program_name,
            style: self.style,
            pages,
        }
    }
}

enum Line<'a> {
    Heading(&'a str),
    Bullet(&'a str),
    Body(&'a str),
    Blank,
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }

    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes > 0 {
        if let Some(rest) = line[hashes..].strip_prefix(' ') {
            return Line::Heading(rest.trim());
        }
    }

    for marker in ["* ", "- ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Line::Bullet(rest.trim());
        }
    }
    Line::Body(line)
}

/// Inline emphasis has no rendering here, so its markers are dropped.
fn plain(text: &str) -> String {
    text.replace("**", "").replace("__", "")
}

struct Cursor<'a> {
    style: &'a PdfStyle,
    pages: Vec<Page>,
    y: f32,
}

impl<'a> Cursor<'a> {
    fn new(style: &'a PdfStyle) -> Self {
        Self {
            style,
            pages: vec![Page::default()],
            y: style.margin,
        }
    }

    fn content_width(&self) -> f32 {
        self.style.page_width - self.style.margin * 2.0
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.style.margin;
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn text(&mut self, x: f32, text: impl Into<String>, size: f32, weight: FontWeight, grey: u8) {
        let y = self.y;
        self.push(DrawOp::Text {
            x,
            y,
            text: text.into(),
            size,
            weight,
            grey,
        });
    }

    fn centred(&mut self, text: &str, size: f32, weight: FontWeight, grey: u8) {
        let x = (self.style.page_width - text_width_mm(text, weight, size)) / 2.0;
        self.text(x, text, size, weight, grey);
    }

    /// Break before any line drawn past the bottom threshold.
    fn ensure_room(&mut self) {
        if self.y > self.style.page_height - self.style.margin {
            self.new_page();
        }
    }

    fn wrapped(&mut self, text: &str, x: f32, width: f32, size: f32, weight: FontWeight, line_height: f32) {
        for line in wrap_text(text, weight, size, width) {
            self.ensure_room();
            self.text(x, line, size, weight, 0);
            self.y += line_height;
        }
    }

    fn markdown(&mut self, markdown: &str) {
        let margin = self.style.margin;
        let width = self.content_width();

        for line in markdown.split('\n') {
            match classify(line) {
                Line::Heading(text) => {
                    self.wrapped(&plain(text), margin, width, HEADING_SIZE, FontWeight::Bold, 7.0);
                    self.y += 4.0;
                }
                Line::Bullet(text) => {
                    self.ensure_room();
                    self.text(margin, "•", BODY_SIZE, FontWeight::Regular, 0);
                    self.wrapped(
                        &plain(text),
                        margin + BULLET_INDENT,
                        width - BULLET_INDENT,
                        BODY_SIZE,
                        FontWeight::Regular,
                        5.0,
                    );
                    self.y += 2.0;
                }
                Line::Body(text) => {
                    self.wrapped(&plain(text), margin, width, BODY_SIZE, FontWeight::Regular, 5.0);
                    self.y += 2.0;
                }
                Line::Blank => self.y += 5.0,
            }
        }
    }

    fn section(&mut self, title: &str, body: &str) {
        let margin = self.style.margin;
        if self.y > self.style.page_height - margin - 20.0 {
            self.new_page();
        }

        self.text(margin, title, SECTION_SIZE, FontWeight::Bold, 0);
        self.y += 7.0;
        let y = self.y;
        self.push(DrawOp::Rule {
            x1: margin,
            x2: self.style.page_width - margin,
            y,
            width: 0.5,
        });
        self.y += 5.0;

        self.markdown(body);
        self.y += 10.0;
    }
}

/// Layout pass: title block, then one section per report field.
pub fn layout_report(result: &SpecificGuidelineResult, style: &PdfStyle) -> LaidOutReport {
    let mut cursor = Cursor::new(style);

    cursor.text(style.margin, style.brand.as_str(), 10.0, FontWeight::Regular, HEADER_GREY);
    cursor.y += 15.0;
    cursor.centred("GDC Compliance Report", 22.0, FontWeight::Bold, TITLE_GREY);
    cursor.y += 10.0;
    cursor.centred(
        &format!("Program: {}", result.program_name),
        16.0,
        FontWeight::Regular,
        TITLE_GREY,
    );
    cursor.y += 25.0;

    for (title, body) in result.sections() {
        cursor.section(title, body);
    }

    LaidOutReport {
        program_name: result.program_name.clone(),
        style: style.clone(),
        pages: cursor.pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(summary: &str) -> SpecificGuidelineResult {
        SpecificGuidelineResult {
            program_name: "A".to_string(),
            executive_summary: summary.to_string(),
            strengths: "- audits".to_string(),
            areas_for_improvement: "- safeguarding".to_string(),
            recommendations: "1. train".to_string(),
            compliance_score: None,
            priority_actions: Vec::new(),
            timeline: None,
            resources_needed: None,
        }
    }

    fn numbered_lines(count: usize) -> String {
        (0..count)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_report_fits_one_page() {
        let laid_out = layout_report(&report("Sound overall."), &PdfStyle::default());
        assert_eq!(laid_out.page_count(), 1);

        let texts: Vec<&str> = laid_out.pages[0].texts().map(|(_, t)| t).collect();
        assert_eq!(&texts[..4], &["DentEdTeck", "GDC Compliance Report", "Program: A", "Executive Summary"]);
        assert!(texts.contains(&"Actionable Recommendations"));
    }

    #[test]
    fn long_section_breaks_once_at_the_overflow_line() {
        let laid_out = layout_report(&report(&numbered_lines(60)), &PdfStyle::default());

        let body_on = |page: &Page| -> Vec<(f32, String)> {
            page.texts()
                .filter(|(_, t)| t.starts_with("line "))
                .map(|(y, t)| (y, t.to_string()))
                .collect()
        };
        let first = body_on(&laid_out.pages[0]);
        let second = body_on(&laid_out.pages[1]);

        assert_eq!(first.len(), 28);
        assert_eq!(first.last().map(|(_, t)| t.as_str()), Some("line 27"));
        assert_eq!(second.len(), 32);
        assert_eq!(second[0], (20.0, "line 28".to_string()));
    }

    #[test]
    fn nothing_is_drawn_below_the_bottom_threshold() {
        let style = PdfStyle::default();
        let body = format!("# Overview\n{}\n\n- {}", numbered_lines(150), "word ".repeat(300));
        let laid_out = layout_report(&report(&body), &style);

        assert!(laid_out.page_count() >= 4);
        for page in &laid_out.pages {
            for (y, _) in page.texts() {
                assert!(y <= style.page_height - style.margin);
            }
        }
    }

    #[test]
    fn markdown_subset_is_classified() {
        let laid_out = layout_report(
            &report("## **Key** findings\n* first point\n\nPlain text"),
            &PdfStyle::default(),
        );
        let ops = &laid_out.pages[0].ops;

        let heading = ops.iter().find_map(|op| match op {
            DrawOp::Text { text, size, weight, .. } if text == "Key findings" => Some((*size, *weight)),
            _ => None,
        });
        assert_eq!(heading, Some((16.0, FontWeight::Bold)));

        let bullet_x = ops.iter().find_map(|op| match op {
            DrawOp::Text { text, x, .. } if text == "first point" => Some(*x),
            _ => None,
        });
        assert_eq!(bullet_x, Some(25.0));
        assert!(ops.iter().any(|op| matches!(op, DrawOp::Text { text, .. } if text == "•")));
    }

    #[test]
    fn finalize_stamps_the_same_total_on_every_page() {
        let laid_out = layout_report(&report(&numbered_lines(120)), &PdfStyle::default());
        let total = laid_out.page_count();
        let finished = laid_out.finalize(2025);

        assert_eq!(finished.page_count(), total);
        for (index, page) in finished.pages.iter().enumerate() {
            let footer = page.texts().last().map(|(_, t)| t.to_string()).unwrap();
            assert_eq!(
                footer,
                format!("Page {} of {} | Copyright © 2025 DentEdTeck", index + 1, total)
            );
        }
    }
}

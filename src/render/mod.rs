//! Result rendering
//!
//! Turns the outcome of one submission into the contents of a display region.
//! Every render clears the region first, so the region only ever shows the
//! latest outcome and never a mix of success and error output.

pub mod payload;

use serde_json::Value;

use crate::charts;
use crate::client::ClientError;
pub use payload::{PayloadError, StatValue, Stats, SubmissionResult};

/// Shown when the server reports a failure without a message
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Shown when the payload matches neither the success nor the failure shape
pub const INVALID_RESPONSE: &str = "Invalid response from server";

/// Alt text used for chart images in HTML output
const IMAGE_ALT: &str = "Stock Chart";

#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Stats(Vec<StatLine>),
    Image { src: String },
    Error { message: String },
}

/// Target of a render. The renderer owns its contents between calls.
pub trait DisplayRegion {
    fn clear(&mut self);
    fn append(&mut self, element: Element);
}

/// In-memory display region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    elements: Vec<Element>,
}

impl DisplayRegion for Region {
    fn clear(&mut self) {
        self.elements.clear();
    }

    fn append(&mut self, element: Element) {
        self.elements.push(element);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] PayloadError),
}

/// Replace the region contents with `result`
pub fn render<R: DisplayRegion + ?Sized>(region: &mut R, result: &SubmissionResult) {
    region.clear();

    match result {
        SubmissionResult::Success { stats, images } => {
            if let Some(stats) = stats {
                let lines: Vec<StatLine> = stats
                    .entries()
                    .map(|(key, value)| StatLine {
                        label: key.label(),
                        value: value.to_string(),
                    })
                    .collect();
                if !lines.is_empty() {
                    region.append(Element::Stats(lines));
                }
            }

            for src in images {
                region.append(Element::Image { src: src.clone() });
            }
        }
        SubmissionResult::Failure { message } => {
            let message = message
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(UNKNOWN_ERROR);
            region.append(Element::Error {
                message: message.to_string(),
            });
        }
    }
}

/// Decode a raw payload and render it.
///
/// A payload that cannot be classified still replaces the region, with a
/// generic error line, before the error is returned.
pub fn render_payload<R: DisplayRegion + ?Sized>(
    region: &mut R,
    payload: &Value,
) -> Result<(), RenderError> {
    match payload::decode(payload) {
        Ok(result) => {
            render(region, &result);
            Ok(())
        }
        Err(e) => {
            show_error(region, INVALID_RESPONSE);
            Err(e.into())
        }
    }
}

/// Render the outcome of a submission, including transport failures.
///
/// This is where every submission error ends up; nothing is re-raised.
pub fn render_outcome<R: DisplayRegion + ?Sized>(
    region: &mut R,
    outcome: &Result<SubmissionResult, ClientError>,
) {
    match outcome {
        Ok(result) => {
            if let SubmissionResult::Failure { message } = result {
                tracing::info!("Server reported failure: {}", message.as_deref().unwrap_or(""));
            }
            render(region, result);
        }
        Err(e) => {
            tracing::warn!("Submission failed: {}", e);
            show_error(region, &e.user_message());
        }
    }
}

fn show_error<R: DisplayRegion + ?Sized>(region: &mut R, message: &str) {
    region.clear();
    region.append(Element::Error {
        message: message.to_string(),
    });
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Image sources in display order
    pub fn images(&self) -> impl Iterator<Item = &str> + '_ {
        self.elements.iter().filter_map(|e| match e {
            Element::Image { src } => Some(src.as_str()),
            _ => None,
        })
    }

    pub fn error(&self) -> Option<&str> {
        self.elements.iter().find_map(|e| match e {
            Element::Error { message } => Some(message.as_str()),
            _ => None,
        })
    }

    /// Plain-text rendering, one line per stat, chart or error
    pub fn to_text(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut chart = 0;

        for element in &self.elements {
            match element {
                Element::Stats(stats) => {
                    for stat in stats {
                        lines.push(format!("{}: {}", stat.label, stat.value));
                    }
                }
                Element::Image { src } => {
                    chart += 1;
                    lines.push(format!("[chart {}] {}", chart, charts::describe(src)));
                }
                Element::Error { message } => lines.push(format!("Error: {}", message)),
            }
        }

        lines
    }

    /// HTML fragment matching the host page markup
    pub fn to_html(&self) -> String {
        let mut html = String::new();

        for element in &self.elements {
            match element {
                Element::Stats(stats) => {
                    html.push_str("<div class=\"stats\">\n");
                    for stat in stats {
                        html.push_str(&format!(
                            "  <p><span>{}:</span> <span>{}</span></p>\n",
                            escape_html(stat.label),
                            escape_html(&stat.value)
                        ));
                    }
                    html.push_str("</div>\n");
                }
                Element::Image { src } => {
                    html.push_str(&format!(
                        "<img src=\"{}\" alt=\"{}\"/>\n",
                        escape_html(src),
                        IMAGE_ALT
                    ));
                }
                Element::Error { message } => {
                    html.push_str(&format!(
                        "<p class=\"error\">Error: {}</p>\n",
                        escape_html(message)
                    ));
                }
            }
        }

        html
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

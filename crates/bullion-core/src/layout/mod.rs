//! Page geometry and word reconstruction.
//!
//! Some report PDFs emit every glyph as its own text object, so the native
//! text blob reads "W i t h d r a w a l" or loses the label altogether. This
//! module rebuilds lines and words from positioned fragments instead.

mod words;

pub use words::WordReconstructor;

use serde::{Deserialize, Serialize};

/// One unit of extracted text (a glyph or a word) with its page position.
///
/// `top` grows downward from the top edge of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedFragment {
    /// Text content.
    pub text: String,
    /// Horizontal start.
    pub x0: f32,
    /// Horizontal end.
    pub x1: f32,
    /// Vertical position.
    pub top: f32,
}

impl PositionedFragment {
    pub fn new(text: impl Into<String>, x0: f32, x1: f32, top: f32) -> Self {
        Self {
            text: text.into(),
            x0,
            x1,
            top,
        }
    }

    /// Horizontal extent of the fragment.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }
}

/// One visual row of a page, tokens in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedLine {
    /// Quantized vertical position shared by every fragment of the row.
    pub top: f32,
    /// Reconstructed words.
    pub tokens: Vec<String>,
}

impl ReconstructedLine {
    /// Tokens joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

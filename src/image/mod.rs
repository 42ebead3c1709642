//! Image normalization ahead of model requests
//!
//! Decodes user-supplied photos and recompresses them so a single image stays
//! under the request-size budget of the inference endpoint.

pub mod normalizer;

pub use normalizer::{CompressionStep, ImageNormalizer};

/// Output encoding family, chosen from the decoded image's alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Png,
    Jpeg,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Re-encoded image ready to embed in a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

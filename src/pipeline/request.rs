use crate::image::Image;
use crate::prompt::{Verbosity, DEFAULT_LANGUAGE};

/// Where the request's image comes from. An inline payload always wins over a
/// token.
#[derive(Debug, Clone, Default)]
pub enum ImageSource {
    Inline(Image),
    Token(String),
    /// An inline payload was sent but could not be decoded.
    Undecodable(String),
    #[default]
    Missing,
}

impl ImageSource {
    pub fn from_parts(inline: Option<Image>, token: Option<String>) -> Self {
        match (inline, token.filter(|t| !t.trim().is_empty())) {
            (Some(image), _) => ImageSource::Inline(image),
            (None, Some(token)) => ImageSource::Token(token.trim().to_string()),
            (None, None) => ImageSource::Missing,
        }
    }

    pub fn inline_len(&self) -> usize {
        match self {
            ImageSource::Inline(image) => image.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistRequest {
    pub source: ImageSource,
    pub question: Option<String>,
    pub language: String,
    pub verbosity: Verbosity,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl AssistRequest {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            question: None,
            language: DEFAULT_LANGUAGE.to_string(),
            verbosity: Verbosity::default(),
            session_id: None,
            correlation_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub source: ImageSource,
    pub language: String,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl OcrRequest {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            language: DEFAULT_LANGUAGE.to_string(),
            session_id: None,
            correlation_id: None,
        }
    }
}

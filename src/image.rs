use image::ImageFormat;
use std::fmt;
use std::sync::Arc;

pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Immutable image payload plus its media type.
///
/// Bytes sit behind an `Arc` so the store, the pipeline and the provider can
/// all hold the same upload without copying it.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl Image {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Builds an image, sniffing the media type when none was declared.
    pub fn from_upload(bytes: Vec<u8>, declared: Option<&str>) -> Self {
        let mime_type = match declared.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => sniff_mime_type(&bytes).to_string(),
        };
        Self::new(bytes, mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Never dump pixel data into logs.
impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Guesses a media type from magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => FALLBACK_MIME_TYPE,
    }
}

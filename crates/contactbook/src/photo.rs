//! Contact photo codec.
//!
//! Photos travel inside the contact document as base64 text. The codec turns
//! a decoded image into that text and back.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PhotoConfig;
use crate::error::{Error, Result};

/// A photo in its transport encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPhoto(String);

impl EncodedPhoto {
    /// Wrap an already encoded blob.
    #[must_use]
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// The encoded text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the encoded text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Converts between decoded images and their text encoding.
pub trait ImageCodec: Send + Sync {
    /// Encode an image into a text blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Photo`] if the image cannot be encoded.
    fn encode(&self, image: &DynamicImage) -> Result<EncodedPhoto>;

    /// Decode a text blob back into an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Photo`] if the blob is not valid base64 or not an image.
    fn decode(&self, photo: &EncodedPhoto) -> Result<DynamicImage>;
}

/// JPEG compressed, base64 encoded photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegBase64Codec {
    quality: u8,
    max_dimension: Option<u32>,
}

impl Default for JpegBase64Codec {
    fn default() -> Self {
        Self::from_config(&PhotoConfig::default())
    }
}

impl JpegBase64Codec {
    /// Create a codec with the given JPEG quality (1-100) and no resizing.
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_dimension: None,
        }
    }

    /// Create a codec from photo configuration.
    #[must_use]
    pub fn from_config(config: &PhotoConfig) -> Self {
        Self::new(config.jpeg_quality).with_max_dimension(config.max_dimension)
    }

    /// Shrink images whose longer side exceeds `max` before encoding.
    #[must_use]
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = Some(max);
        self
    }
}

impl ImageCodec for JpegBase64Codec {
    fn encode(&self, image: &DynamicImage) -> Result<EncodedPhoto> {
        let resized;
        let image = match self.max_dimension {
            Some(max) => {
                resized = resize_to_fit(image, max);
                &resized
            }
            None => image,
        };

        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| Error::photo(format!("JPEG encoding failed: {e}")))?;

        debug!(
            width = rgb.width(),
            height = rgb.height(),
            bytes = bytes.len(),
            "Encoded photo"
        );
        Ok(EncodedPhoto(STANDARD.encode(bytes)))
    }

    fn decode(&self, photo: &EncodedPhoto) -> Result<DynamicImage> {
        // Blobs written by other clients may be MIME-wrapped
        let compact: String = photo
            .as_str()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if compact.is_empty() {
            return Err(Error::photo("photo is empty"));
        }

        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| Error::photo(format!("invalid base64: {e}")))?;
        image::load_from_memory(&bytes).map_err(|e| Error::photo(format!("invalid image: {e}")))
    }
}

/// Scale an image so its longer side is at most `max_size`, keeping the
/// aspect ratio. Images already within bounds are returned unchanged.
#[must_use]
pub fn resize_to_fit(image: &DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if max_size == 0 || (width <= max_size && height <= max_size) {
        return image.clone();
    }
    image.resize(max_size, max_size, FilterType::Triangle)
}

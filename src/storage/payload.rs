//! Image payloads and content keys

use image::DynamicImage;
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Content key for a blob URL: lowercase hex SHA-256 of the URL string
///
/// Used as the cache key in both tiers and as the on-disk file name.
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Whether `key` has the shape `cache_key` produces
pub fn is_cache_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Image container formats recognised by their magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
}

impl ImageFormat {
    /// Sniff the format from the first bytes of a payload
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::WebP => image::ImageFormat::WebP,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

/// A decoded image held by the cache tiers
///
/// Keeps the encoded payload for the disk tier next to the decoded pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub pixels: DynamicImage,
}

impl DecodedImage {
    /// Decode raw bytes into pixels
    ///
    /// # Errors
    /// Returns `AppError::Decode` for empty, unrecognised, truncated or
    /// otherwise corrupt payloads
    pub fn decode(data: Vec<u8>) -> Result<Self, AppError> {
        if data.is_empty() {
            return Err(AppError::Decode("empty payload".to_string()));
        }

        let format = ImageFormat::detect(&data).ok_or_else(|| {
            AppError::Decode(format!("unrecognised header in {} byte payload", data.len()))
        })?;

        let pixels = image::load_from_memory_with_format(&data, format.into()).map_err(|e| {
            AppError::Decode(format!("{} payload of {} bytes: {e}", format.mime_type(), data.len()))
        })?;

        Ok(Self {
            data,
            format,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Weight of this image in the memory tier: the decoded pixel buffer size
    pub fn cost(&self) -> usize {
        self.width() as usize
            * self.height() as usize
            * usize::from(self.pixels.color().bytes_per_pixel())
    }
}

/// Encoded RGBA PNG of the given size, for tests across the crate
#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbaImage::new(width, height)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

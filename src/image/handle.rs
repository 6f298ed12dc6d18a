use crate::error::{Result, VislensError};
use crate::llm::models::ImageAttachment;
use base64::Engine;

/// An image ready to be sent to a vision model.
///
/// The bytes are base64-encoded once at construction; the handle is immutable afterwards.
/// `display_reference` is whatever the front end uses to show the image (a path or URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    encoded_bytes: String,
    media_type: String,
    display_reference: String,
}

impl ImageHandle {
    /// Build a handle from raw bytes.
    ///
    /// A declared `image/*` type (e.g. an HTTP `Content-Type`) wins; otherwise the
    /// type is sniffed from the leading bytes.
    pub fn from_bytes(
        bytes: &[u8],
        declared_type: Option<&str>,
        display_reference: impl Into<String>,
    ) -> Result<Self> {
        if bytes.is_empty() {
            return Err(VislensError::ImageError("image is empty".to_string()));
        }

        let media_type = declared_type
            .and_then(normalize_media_type)
            .or_else(|| detect_media_type(bytes).map(String::from))
            .ok_or_else(|| {
                VislensError::ImageError("unrecognized image format".to_string())
            })?;

        Ok(Self {
            encoded_bytes: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type,
            display_reference: display_reference.into(),
        })
    }

    /// Build a handle from an already base64-encoded payload.
    pub fn from_encoded(
        encoded_bytes: impl Into<String>,
        media_type: impl Into<String>,
        display_reference: impl Into<String>,
    ) -> Self {
        Self {
            encoded_bytes: encoded_bytes.into(),
            media_type: media_type.into(),
            display_reference: display_reference.into(),
        }
    }

    pub fn encoded_bytes(&self) -> &str {
        &self.encoded_bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn display_reference(&self) -> &str {
        &self.display_reference
    }

    /// The inline attachment form understood by the LLM gateways
    pub fn attachment(&self) -> ImageAttachment {
        ImageAttachment {
            data: self.encoded_bytes.clone(),
            media_type: self.media_type.clone(),
        }
    }
}

fn normalize_media_type(declared: &str) -> Option<String> {
    let essence = declared.split(';').next()?.trim().to_ascii_lowercase();
    essence.starts_with("image/").then_some(essence)
}

/// Sniff the media type from magic bytes.
pub fn detect_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn test_from_bytes_encodes_base64() {
        let handle = ImageHandle::from_bytes(PNG_HEADER, None, "./photo.png").unwrap();

        let expected = base64::engine::general_purpose::STANDARD.encode(PNG_HEADER);
        assert_eq!(handle.encoded_bytes(), expected);
        assert_eq!(handle.media_type(), "image/png");
        assert_eq!(handle.display_reference(), "./photo.png");
    }

    #[test]
    fn test_declared_type_wins_over_sniffing() {
        let handle =
            ImageHandle::from_bytes(PNG_HEADER, Some("image/x-custom; q=1"), "blob").unwrap();
        assert_eq!(handle.media_type(), "image/x-custom");
    }

    #[test]
    fn test_non_image_declared_type_falls_back_to_sniffing() {
        let handle =
            ImageHandle::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0], Some("text/html"), "x").unwrap();
        assert_eq!(handle.media_type(), "image/jpeg");
    }

    #[test]
    fn test_unrecognized_bytes_rejected() {
        let result = ImageHandle::from_bytes(b"hello world", None, "notes.txt");
        assert!(matches!(result, Err(VislensError::ImageError(_))));
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let result = ImageHandle::from_bytes(&[], Some("image/png"), "empty.png");
        assert!(matches!(result, Err(VislensError::ImageError(_))));
    }

    #[test]
    fn test_detect_media_type() {
        assert_eq!(detect_media_type(b"GIF89a...."), Some("image/gif"));
        assert_eq!(detect_media_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(detect_media_type(b"BM\0\0"), Some("image/bmp"));
        assert_eq!(detect_media_type(b"RIFF\0\0\0\0WAVE"), None);
    }

    #[test]
    fn test_attachment_carries_payload_and_type() {
        let handle = ImageHandle::from_encoded("aGk=", "image/jpeg", "cover.jpg");
        let attachment = handle.attachment();

        assert_eq!(attachment.data, "aGk=");
        assert_eq!(attachment.media_type, "image/jpeg");
    }
}

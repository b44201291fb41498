//! Cover image uploads attached to posts.

use crate::error::DomainError;

/// MIME types accepted for post covers.
pub const ALLOWED_COVER_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Largest accepted cover, in bytes (5 MiB).
pub const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;

const MAX_EXTENSION_LEN: usize = 5;

/// An uploaded cover file, held in memory until it is stored.
#[derive(Debug, Clone)]
pub struct CoverUpload {
    /// File name as sent by the client.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl CoverUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Check type and size before anything is written.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !ALLOWED_COVER_TYPES.contains(&self.content_type.as_str()) {
            return Err(DomainError::Validation("Invalid file type".to_string()));
        }
        if self.bytes.len() > MAX_COVER_BYTES {
            return Err(DomainError::Validation(
                "File size exceeds limit".to_string(),
            ));
        }
        Ok(())
    }

    /// Extension for the stored file: the client's extension when it looks sane,
    /// otherwise one derived from the MIME type.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            });

        match from_name {
            Some(ext) => ext.to_ascii_lowercase(),
            None => match self.content_type.as_str() {
                "image/png" => "png",
                "image/gif" => "gif",
                _ => "jpg",
            }
            .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allowed_types() {
        for mime in ALLOWED_COVER_TYPES {
            let cover = CoverUpload::new("a.img", mime, vec![0u8; 16]);
            assert!(cover.validate().is_ok(), "{mime} should be accepted");
        }
    }

    #[test]
    fn test_rejects_pdf() {
        let cover = CoverUpload::new("paper.pdf", "application/pdf", vec![0u8; 16]);
        assert!(matches!(
            cover.validate(),
            Err(DomainError::Validation(msg)) if msg == "Invalid file type"
        ));
    }

    #[test]
    fn test_rejects_oversize() {
        let cover = CoverUpload::new("big.png", "image/png", vec![0u8; MAX_COVER_BYTES + 1]);
        assert!(cover.validate().is_err());

        let exact = CoverUpload::new("ok.png", "image/png", vec![0u8; MAX_COVER_BYTES]);
        assert!(exact.validate().is_ok());
    }

    #[test]
    fn test_extension_from_file_name() {
        let cover = CoverUpload::new("holiday.photo.JPEG", "image/jpeg", vec![]);
        assert_eq!(cover.extension(), "jpeg");
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        assert_eq!(CoverUpload::new("noext", "image/gif", vec![]).extension(), "gif");
        assert_eq!(
            CoverUpload::new("x.../../etc", "image/png", vec![]).extension(),
            "png"
        );
        assert_eq!(
            CoverUpload::new("x.toolongext", "image/jpeg", vec![]).extension(),
            "jpg"
        );
    }
}

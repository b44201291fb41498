//! Multipart post form parsing.

use actix_multipart::{Field, Multipart};
use futures::TryStreamExt;

use quill_core::domain::{CoverUpload, MAX_COVER_BYTES, PostChanges, PostDraft};

use crate::middleware::error::{AppError, AppResult};

/// Limit for any single text field.
const MAX_TEXT_FIELD_BYTES: usize = 1024 * 1024;

/// Name of the form field carrying the cover image.
const FILE_FIELD: &str = "file";

/// Fields of a create or update post form. Unknown fields are ignored.
#[derive(Debug, Default)]
pub struct PostForm {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub cover: Option<CoverUpload>,
}

impl PostForm {
    /// All text fields must be present for a new post.
    pub fn into_draft(self) -> (PostDraft, Option<CoverUpload>) {
        let draft = PostDraft {
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
        };
        (draft, self.cover)
    }

    pub fn into_changes(self) -> (Option<String>, PostChanges, Option<CoverUpload>) {
        let changes = PostChanges {
            title: self.title,
            summary: self.summary,
            content: self.content,
        };
        (self.id, changes, self.cover)
    }
}

/// Drain a multipart body into a [`PostForm`].
///
/// Oversized parts are rejected as soon as they cross their limit, without
/// buffering the remainder.
pub async fn read_post_form(mut payload: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            FILE_FIELD => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                let content_type = field
                    .content_type()
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();

                // Browsers send an empty part when no file is picked. A named
                // but empty file is treated the same way.
                let bytes = read_limited(&mut field, MAX_COVER_BYTES, "File size exceeds limit").await?;
                if bytes.is_empty() {
                    continue;
                }
                form.cover = Some(CoverUpload::new(file_name, content_type, bytes));
            }
            "id" | "title" | "summary" | "content" => {
                let bytes = read_limited(&mut field, MAX_TEXT_FIELD_BYTES, "Field too large").await?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| AppError::BadRequest(format!("Field {} is not valid UTF-8", name)))?;
                match name.as_str() {
                    "id" => form.id = Some(text),
                    "title" => form.title = Some(text),
                    "summary" => form.summary = Some(text),
                    _ => form.content = Some(text),
                }
            }
            _ => {
                tracing::debug!(field = %name, "Skipping unknown form field");
                while field.try_next().await?.is_some() {}
            }
        }
    }

    Ok(form)
}

async fn read_limited(field: &mut Field, limit: usize, message: &str) -> AppResult<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > limit {
            return Err(AppError::BadRequest(message.to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use actix_web::{FromRequest, test};

    use super::*;

    pub(crate) const BOUNDARY: &str = "quill-test-boundary";

    /// One form part: `(name, filename, content type, bytes)`.
    pub(crate) type Part<'a> = (&'a str, Option<&'a str>, Option<&'a str>, &'a [u8]);

    pub(crate) fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
        (name, None, None, value.as_bytes())
    }

    pub(crate) fn file<'a>(file_name: &'a str, content_type: &'a str, bytes: &'a [u8]) -> Part<'a> {
        (FILE_FIELD, Some(file_name), Some(content_type), bytes)
    }

    /// Hand-built multipart body.
    pub(crate) fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content_type, bytes) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
                ),
            }
            if let Some(content_type) = content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub(crate) fn content_type() -> (&'static str, String) {
        ("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
    }

    async fn parse(body: Vec<u8>) -> AppResult<PostForm> {
        let (req, mut payload) = test::TestRequest::post()
            .insert_header(content_type())
            .set_payload(body)
            .to_http_parts();
        let multipart = Multipart::from_request(&req, &mut payload).await.unwrap();
        read_post_form(multipart).await
    }

    #[actix_web::test]
    async fn test_reads_text_fields_and_file() {
        let png = [0x89, b'P', b'N', b'G'];
        let body = multipart_body(&[
            text("title", "Hello"),
            text("summary", "Short"),
            text("content", "<p>Body</p>"),
            file("cover.png", "image/png", &png),
            text("extra", "ignored"),
        ]);

        let form = parse(body).await.unwrap();

        assert_eq!(form.title.as_deref(), Some("Hello"));
        assert_eq!(form.summary.as_deref(), Some("Short"));
        assert_eq!(form.content.as_deref(), Some("<p>Body</p>"));
        let cover = form.cover.unwrap();
        assert_eq!(cover.file_name, "cover.png");
        assert_eq!(cover.content_type, "image/png");
        assert_eq!(cover.bytes.len(), 4);
    }

    #[actix_web::test]
    async fn test_empty_file_part_means_no_cover() {
        let body = multipart_body(&[
            text("id", "abc"),
            file("", "application/octet-stream", &[]),
        ]);

        let form = parse(body).await.unwrap();

        assert_eq!(form.id.as_deref(), Some("abc"));
        assert!(form.cover.is_none());
    }

    #[actix_web::test]
    async fn test_named_empty_file_means_no_cover() {
        let body = multipart_body(&[
            text("title", "Hello"),
            file("cover.jpg", "image/jpeg", &[]),
        ]);

        let form = parse(body).await.unwrap();

        assert_eq!(form.title.as_deref(), Some("Hello"));
        assert!(form.cover.is_none());
    }

    #[actix_web::test]
    async fn test_oversized_file_rejected() {
        let big = vec![0u8; MAX_COVER_BYTES + 1];
        let body = multipart_body(&[file("big.jpg", "image/jpeg", &big)]);

        let err = parse(body).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "File size exceeds limit"));
    }
}

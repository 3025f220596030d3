//! Blob-store boundary for message attachments.
//!
//! Storage mechanics are opaque to the engine: bytes are handed off at the
//! boundary, metadata is recorded here, and the returned reference carries
//! the URL clients fetch from.

use chatdesk_shared::AttachmentRef;
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    error::{EngineError, EngineResult},
    ChatEngine,
};

const MAX_FILENAME_LEN: usize = 255;

fn validate_attachment(
    filename: &str,
    mime: &str,
    size: i64,
    config: &EngineConfig,
) -> EngineResult<()> {
    if filename.trim().is_empty() || filename.len() > MAX_FILENAME_LEN {
        return Err(EngineError::InvalidInput(format!(
            "filename must be 1-{} characters",
            MAX_FILENAME_LEN
        )));
    }
    if size <= 0 {
        return Err(EngineError::InvalidInput(
            "attachment is empty".to_string(),
        ));
    }
    if size > config.max_attachment_bytes {
        return Err(EngineError::TooLong(config.max_attachment_bytes as usize));
    }
    if !config.allowed_attachment_mime.iter().any(|m| m == mime) {
        return Err(EngineError::InvalidInput(format!(
            "attachment type {} is not allowed",
            mime
        )));
    }
    Ok(())
}

impl ChatEngine {
    /// Record an attachment and mint the reference messages embed.
    pub async fn store_attachment(
        &self,
        filename: &str,
        mime: &str,
        size: i64,
    ) -> EngineResult<AttachmentRef> {
        validate_attachment(filename, mime, size, &self.config)?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO chat_attachments (filename, mime, size_bytes) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(filename)
        .bind(mime)
        .bind(size)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(attachment_id = %id, mime = %mime, size = size, "Attachment stored");

        Ok(AttachmentRef {
            id,
            url: format!(
                "{}/attachments/{}",
                self.config.attachment_base_url.trim_end_matches('/'),
                id
            ),
            filename: filename.to_string(),
            size,
            mime: mime.to_string(),
        })
    }

    /// Look up a previously stored attachment by id.
    pub async fn attachment_ref(&self, id: Uuid) -> EngineResult<AttachmentRef> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT filename, mime, size_bytes FROM chat_attachments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let (filename, mime, size) = row.ok_or(EngineError::NotFound)?;
        Ok(AttachmentRef {
            id,
            url: format!(
                "{}/attachments/{}",
                self.config.attachment_base_url.trim_end_matches('/'),
                id
            ),
            filename,
            size,
            mime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_filename() {
        let config = EngineConfig::default();
        assert!(validate_attachment("", "image/png", 10, &config).is_err());
    }

    #[test]
    fn test_rejects_disallowed_mime() {
        let config = EngineConfig::default();
        assert!(matches!(
            validate_attachment("a.exe", "application/x-msdownload", 10, &config),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_oversized() {
        let config = EngineConfig::default();
        let too_big = config.max_attachment_bytes + 1;
        assert!(matches!(
            validate_attachment("a.png", "image/png", too_big, &config),
            Err(EngineError::TooLong(_))
        ));
    }

    #[test]
    fn test_accepts_allowed_file() {
        let config = EngineConfig::default();
        assert!(validate_attachment("screenshot.png", "image/png", 1024, &config).is_ok());
    }
}

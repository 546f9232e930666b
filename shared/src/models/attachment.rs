use std::fmt;

use crate::error::AppError;
use crate::transport::FilePart;

pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// A file picked by the shell, ready to be sent as a multipart part.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AppError> {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self::with_content_type(file_name, content_type, bytes)
    }

    pub fn with_content_type(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, AppError> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() || file_name.contains(['/', '\\']) {
            return Err(AppError::invalid_request("Attachment needs a plain file name"));
        }
        if bytes.is_empty() {
            return Err(AppError::invalid_request("Attachment is empty"));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AppError::invalid_request(format!(
                "Attachment is {} bytes, the limit is {MAX_ATTACHMENT_BYTES}",
                bytes.len()
            )));
        }
        Ok(Self {
            file_name,
            content_type: content_type.into(),
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn into_part(self, field_name: &str) -> FilePart {
        FilePart {
            field_name: field_name.to_string(),
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

//! crates/research_assistant_core/src/upload.rs
//!
//! Staging of the files a user attaches to a question. Only a file's name, size and
//! media type are ever looked at; the contents stay with the client.

/// Largest accepted file, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Media types accepted for staging: PDF, DOC, DOCX and plain text.
pub const ACCEPTED_MEDIA_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// What the client tells us about a file it wants to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
}

/// Why a single file was turned away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("{name} is {size_bytes} bytes, over the {} byte limit", MAX_UPLOAD_BYTES)]
    TooLarge { name: String, size_bytes: u64 },
    #[error("{name} has unsupported media type '{media_type}'")]
    UnsupportedType { name: String, media_type: String },
}

impl UploadRejection {
    pub fn file_name(&self) -> &str {
        match self {
            Self::TooLarge { name, .. } | Self::UnsupportedType { name, .. } => name,
        }
    }

    /// The notification text shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "File too large. Maximum size is 10MB.",
            Self::UnsupportedType { .. } => {
                "Unsupported file type. Please upload PDF, DOC, DOCX, or TXT files."
            }
        }
    }
}

/// Checks a single file against the size limit and the accepted media types.
pub fn validate(file: &FileDescriptor) -> Result<(), UploadRejection> {
    if file.size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge {
            name: file.name.clone(),
            size_bytes: file.size_bytes,
        });
    }
    if !ACCEPTED_MEDIA_TYPES.contains(&file.media_type.as_str()) {
        return Err(UploadRejection::UnsupportedType {
            name: file.name.clone(),
            media_type: file.media_type.clone(),
        });
    }
    Ok(())
}

/// The ordered list of accepted files for the next query.
#[derive(Debug, Clone, Default)]
pub struct UploadStaging {
    files: Vec<FileDescriptor>,
}

impl UploadStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages every acceptable file of the batch, in order. Returns one outcome per
    /// input file; a rejection never affects the other files.
    pub fn stage_batch<I>(&mut self, batch: I) -> Vec<Result<(), UploadRejection>>
    where
        I: IntoIterator<Item = FileDescriptor>,
    {
        batch
            .into_iter()
            .map(|file| {
                validate(&file)?;
                self.files.push(file);
                Ok(())
            })
            .collect()
    }

    /// Removes every staged file called `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        before - self.files.len()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

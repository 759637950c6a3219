use std::path::Path;

use super::{Document, DocumentError};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

const EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Reads a persona reference file as one UTF-8 document.
///
/// A leading byte-order mark is dropped and `\r\n` line endings become `\n`, so chunk
/// offsets do not depend on the editor that produced the file.
#[derive(Debug, Clone, Copy)]
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl TextLoader {
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] if the file cannot be read,
    /// [`DocumentError::UnsupportedFormat`] for other extensions,
    /// [`DocumentError::FileTooLarge`] above `max_file_size` and
    /// [`DocumentError::Encoding`] for non-UTF-8 content.
    pub async fn load(&self, path: &Path) -> Result<Document, DocumentError> {
        let path = tokio::fs::canonicalize(path).await?;

        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)));
        if !supported {
            return Err(DocumentError::UnsupportedFormat(path));
        }

        let size = tokio::fs::metadata(&path).await?.len();
        if size > self.max_file_size {
            return Err(DocumentError::FileTooLarge {
                path,
                size,
                limit: self.max_file_size,
            });
        }

        let bytes = tokio::fs::read(&path).await?;
        let Ok(text) = String::from_utf8(bytes) else {
            return Err(DocumentError::Encoding(path));
        };
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let content = if text.contains("\r\n") {
            text.replace("\r\n", "\n")
        } else {
            text.to_owned()
        };

        tracing::debug!(path = %path.display(), chars = content.chars().count(), "loaded document");
        Ok(Document::from_text(content, path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("INFP.txt");
        std::fs::write(&file, "중재자형\n이상주의자").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.content, "중재자형\n이상주의자");
        assert!(doc.metadata.persona.is_none());
    }

    #[tokio::test]
    async fn markdown_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.MD");
        std::fs::write(&file, "# Title").unwrap();
        assert_eq!(TextLoader::default().load(&file).await.unwrap().content, "# Title");
    }

    #[tokio::test]
    async fn bom_and_crlf_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ENTP.txt");
        std::fs::write(&file, "\u{feff}line one\r\nline two\r\n").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.content, "line one\nline two\n");
    }

    #[tokio::test]
    async fn load_nonexistent_file() {
        let result = TextLoader::default()
            .load(Path::new("/nonexistent/file.txt"))
            .await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.csv");
        std::fs::write(&file, "a,b,c").unwrap();

        let err = TextLoader::default().load(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
        assert!(err.to_string().contains("data.csv"));
    }

    #[tokio::test]
    async fn invalid_utf8_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ISTJ.txt");
        std::fs::write(&file, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let result = TextLoader::default().load(&file).await;
        assert!(matches!(result, Err(DocumentError::Encoding(_))));
    }

    #[tokio::test]
    async fn metadata_source_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        std::fs::write(&file, "data").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        let canonical = std::fs::canonicalize(&file).unwrap();
        assert_eq!(doc.metadata.source, canonical.display().to_string());
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "x").unwrap();

        let loader = TextLoader { max_file_size: 0 };
        let result = loader.load(&file).await;
        assert!(matches!(
            result,
            Err(DocumentError::FileTooLarge { size: 1, limit: 0, .. })
        ));
    }
}

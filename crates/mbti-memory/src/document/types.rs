/// Where a document came from and which persona it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub source: String,
    pub persona: Option<String>,
}

/// A whole reference text, before chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[must_use]
    pub fn from_text(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                persona: None,
            },
        }
    }

    /// Tag the document with the persona code it was loaded for.
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.metadata.persona = Some(persona.into());
        self
    }
}

/// Contiguous slice of a document. `start..end` are char offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
}

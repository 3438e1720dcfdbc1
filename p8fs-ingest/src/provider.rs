//! ABOUTME: Content-provider registry — per-format extractors are external; the generic fallback is not
//! ABOUTME: Registry tries providers in priority order, falling through to GenericProvider last

use p8fs_core::Json;
use serde_json::{json, Value};

/// Metadata sufficient to pick a provider, before any bytes are read.
#[derive(Debug, Clone)]
pub struct ContentMeta {
    pub file_path: String,
    pub content_type: Option<String>,
}

impl ContentMeta {
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.file_path.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// One chunk of a processed file, pre-embedding (§4.D embeds it on upsert).
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: Json,
}

/// A format-specific extractor (§4.G "resolve a content provider by
/// extension or media type"). PDF/audio/docx extractors are named in the
/// specification as external collaborators; only the trait and the
/// catch-all fallback live in this crate.
pub trait ContentProvider: Send + Sync {
    fn can_process(&self, meta: &ContentMeta) -> bool;

    /// Produce file-level metadata plus an ordered list of chunks.
    fn process(&self, bytes: &[u8], meta: &ContentMeta) -> (Json, Vec<Chunk>);
}

/// Fallback provider: always matches. Text/markdown-shaped bytes are
/// chunked by blank-line paragraph boundaries (capped at `max_chunk_chars`);
/// JSON/YAML-shaped bytes additionally sample a few top-level keys into
/// `metadata.document_keys`; anything else is stored as one opaque chunk.
pub struct GenericProvider {
    max_chunk_chars: usize,
}

impl Default for GenericProvider {
    fn default() -> Self {
        Self { max_chunk_chars: 800 }
    }
}

impl GenericProvider {
    #[must_use]
    pub fn with_max_chunk_chars(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    fn chunk_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        for paragraph in text.split("\n\n") {
            if !current.is_empty() && current.len() + paragraph.len() > self.max_chunk_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        if !current.trim().is_empty() {
            chunks.push(current);
        }
        if chunks.is_empty() {
            chunks.push(text.to_string());
        }
        chunks
    }
}

impl ContentProvider for GenericProvider {
    fn can_process(&self, _meta: &ContentMeta) -> bool {
        true
    }

    fn process(&self, bytes: &[u8], _meta: &ContentMeta) -> (Json, Vec<Chunk>) {
        let text = String::from_utf8_lossy(bytes);

        if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
            let document_keys: Vec<String> = match &parsed {
                Value::Object(map) => map.keys().take(10).cloned().collect(),
                _ => Vec::new(),
            };
            let metadata = Json(json!({ "document_keys": document_keys }));
            return (metadata, vec![Chunk { content: text.to_string(), metadata: Json::null() }]);
        }

        let chunks = self
            .chunk_text(&text)
            .into_iter()
            .map(|content| Chunk { content, metadata: Json::null() })
            .collect();
        (Json::object(), chunks)
    }
}

/// Providers tried in registration order; [`GenericProvider`] is always
/// appended last so every file produces at least one chunk.
pub struct ProcessorRegistry {
    providers: Vec<Box<dyn ContentProvider>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self { providers: vec![Box::new(GenericProvider::default())] }
    }
}

impl ProcessorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Box<dyn ContentProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn with_generic_fallback(mut self) -> Self {
        self.providers.push(Box::new(GenericProvider::default()));
        self
    }

    #[must_use]
    pub fn resolve(&self, meta: &ContentMeta) -> Option<&dyn ContentProvider> {
        self.providers.iter().find(|p| p.can_process(meta)).map(std::convert::AsRef::as_ref)
    }
}

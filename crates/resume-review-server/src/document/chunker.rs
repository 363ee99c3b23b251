use anyhow::{Context, Result};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
}

/// Character-budget splitter preferring paragraph, line, sentence and word
/// boundaries, with a fixed overlap between neighbouring chunks.
pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(overlap)
            .with_context(|| {
                format!("Invalid chunking: size {} with overlap {}", chunk_size, overlap)
            })?;

        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chunks: Vec<Chunk> = self
            .splitter
            .chunks(text)
            .filter(|c| !c.trim().is_empty())
            .enumerate()
            .map(|(index, content)| Chunk {
                index,
                content: content.to_string(),
            })
            .collect();

        debug!("Split {} chars into {} chunks", text.len(), chunks.len());
        chunks
    }
}

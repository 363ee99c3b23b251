pub mod chunker;
pub mod parser;

pub use chunker::{Chunk, TextChunker};
pub use parser::{DocumentMetadata, DocumentParser, ParsedDocument};

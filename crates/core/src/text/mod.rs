pub mod chunk;
pub mod segment;

pub use chunk::{chunk_sentences, SentenceChunk};
pub use segment::{RuleSegmenter, SentenceSegmenter};

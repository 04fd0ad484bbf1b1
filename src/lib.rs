//! Tokenfit - fit source files into LLM context budgets.
//!
//! Tokenfit shrinks content that is over a token budget in graded steps
//! ("condensing") and splits content that must be sent whole into ordered,
//! self-describing pieces ("chunking"). Both follow the structure of the
//! language: Python is parsed with tree-sitter, brace languages are handled
//! with patterns and brace counting, JSON/YAML are described by shape.
//!
//! # Quick Start
//!
//! ```no_run
//! use tokenfit::{ChunkingStrategy, PriorityLevel, ProgressiveCondenser, SmartChunker};
//!
//! let source = std::fs::read_to_string("service.py").unwrap();
//!
//! // Fit a file into 500 tokens
//! let mut condenser = ProgressiveCondenser::new();
//! let result = condenser.condense_with_budget(&source, "service.py", 500, PriorityLevel::High, None);
//! println!("{} -> {} tokens at {}", result.original_tokens, result.final_tokens, result.level);
//!
//! // Or split it into chunks of at most 2000 tokens
//! let mut chunker = SmartChunker::new(ChunkingStrategy::default());
//! for chunk in chunker.chunk_with_context(&source, "service.py", 2000, PriorityLevel::High, true) {
//!     println!("chunk {}/{}: {} tokens", chunk.chunk_id, chunk.total_chunks, chunk.estimated_tokens);
//! }
//! ```
//!
//! # Modules
//!
//! - [`tokens`] - Token counting for LLM context budgets
//! - [`priority`] - Importance levels that steer how hard content is reduced
//! - [`language`] - Language detection from file names
//! - [`condenser`] - Budget-driven progressive condensing
//! - [`chunker`] - Structure-aware chunking with continuation context
//! - [`errors`] - Errors surfaced by the command line tool
//!
//! # Supported Languages
//!
//! - Python (`.py`, `.pyi`)
//! - JavaScript (`.js`, `.mjs`, `.cjs`, `.jsx`)
//! - TypeScript (`.ts`, `.tsx`)
//! - Java (`.java`)
//! - JSON and YAML (`.json`, `.yaml`, `.yml`)
//!
//! Anything else is handled line by line.

pub mod tokens;
pub mod priority;
pub mod language;
pub(crate) mod lang;
pub mod condenser;
pub mod chunker;
pub mod errors;

// Re-export key types at crate root for convenience
pub use chunker::{Chunk, ChunkType, ChunkerStats, ChunkingStrategy, SmartChunker};
pub use condenser::{
    adjust_condensing_level, select_condensing_level, CondenserStats, CondensingLevel,
    CondensingResult, ProgressiveCondenser,
};
pub use errors::TokenfitError;
pub use language::{detect_language, Language, LanguageFamily};
pub use priority::PriorityLevel;
pub use tokens::{count_tokens, Encoding, TokenCounter, TokenEstimator};

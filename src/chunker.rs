//! Structure-aware splitting of content that does not fit a token budget.
//!
//! Chunks are packed greedily line by line, but a structural span
//! (function, class, declaration) that starts on the current line is
//! placed whole whenever it fits in a chunk on its own. Spans larger than a
//! chunk are split with their signature (the declaration line, after any
//! decorators) repeated at the top of every later part. An enrichment pass then adds overlap markers and part headers so
//! each chunk can be read in isolation.
//!
//! The source lines covered by the chunks, taken in `chunk_id` order via
//! [`Chunk::line_range`], always reassemble the input exactly; enrichment
//! only adds text around them.

use std::ops::RangeInclusive;

use serde::Serialize;
use tracing::{debug, trace};

use crate::lang::{split_lines, strategy_for, Boundary, BoundaryKind};
use crate::language::{detect_language, display_name, Language, LanguageFamily};
use crate::priority::PriorityLevel;
use crate::tokens::{TokenCounter, TokenEstimator};

/// Chunk count [`SmartChunker::estimate_optimal_chunk_size`] is usually
/// asked to aim for.
pub const DEFAULT_TARGET_CHUNKS: usize = 3;

/// Role of a chunk in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    #[default]
    Content,
    Header,
    Footer,
    Context,
}

/// One ordered piece of a content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub content: String,
    /// 1-based position in the sequence.
    pub chunk_id: usize,
    pub total_chunks: usize,
    /// 0-indexed first source line covered.
    pub start_line: Option<usize>,
    /// 0-indexed last source line covered (inclusive).
    pub end_line: Option<usize>,
    pub context_info: Option<String>,
    /// Chunk this one continues, when a span was split across chunks.
    pub continuation_from: Option<usize>,
    /// Chunk that continues this one.
    pub continues_to: Option<usize>,
    /// Estimate of `content` as it finally stands.
    pub estimated_tokens: usize,
    pub chunk_type: ChunkType,
}

impl Chunk {
    fn new(content: String, chunk_id: usize, lines: RangeInclusive<usize>, estimated_tokens: usize) -> Self {
        Self {
            content,
            chunk_id,
            total_chunks: 0,
            start_line: Some(*lines.start()),
            end_line: Some(*lines.end()),
            context_info: None,
            continuation_from: None,
            continues_to: None,
            estimated_tokens,
            chunk_type: ChunkType::Content,
        }
    }

    /// Source lines this chunk covers, if known.
    pub fn line_range(&self) -> Option<RangeInclusive<usize>> {
        Some(self.start_line?..=self.end_line?)
    }
}

/// Chunking behaviour, fixed at chunker construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingStrategy {
    /// Keep function/method spans whole when they fit.
    pub preserve_functions: bool,
    /// Keep class spans whole when they fit.
    pub preserve_classes: bool,
    /// Add part headers and footers when content is split.
    pub include_context_headers: bool,
    /// Mark functions that cross chunk edges.
    pub overlap_functions: bool,
    /// Most overlap markers added to one chunk.
    pub max_context_lines: usize,
    /// Chunks estimated below this many tokens are reported as undersized.
    pub min_chunk_size: usize,
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self {
            preserve_functions: true,
            preserve_classes: true,
            include_context_headers: true,
            overlap_functions: true,
            max_context_lines: 5,
            min_chunk_size: 100,
        }
    }
}

impl ChunkingStrategy {
    pub fn preserve_functions(mut self, preserve: bool) -> Self {
        self.preserve_functions = preserve;
        self
    }

    pub fn preserve_classes(mut self, preserve: bool) -> Self {
        self.preserve_classes = preserve;
        self
    }

    pub fn include_context_headers(mut self, include: bool) -> Self {
        self.include_context_headers = include;
        self
    }

    pub fn overlap_functions(mut self, overlap: bool) -> Self {
        self.overlap_functions = overlap;
        self
    }

    pub fn max_context_lines(mut self, lines: usize) -> Self {
        self.max_context_lines = lines;
        self
    }

    pub fn min_chunk_size(mut self, tokens: usize) -> Self {
        self.min_chunk_size = tokens;
        self
    }
}

/// Counters accumulated by one chunker instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkerStats {
    /// Calls that produced more than the single-chunk fast path.
    pub files_chunked: usize,
    pub total_chunks_created: usize,
    /// Chunks that received part headers.
    pub context_preservations: usize,
    /// Chunks that received function overlap markers.
    pub function_overlaps: usize,
    pub undersized_chunks: usize,
}

impl ChunkerStats {
    pub fn merge(&mut self, other: &ChunkerStats) {
        self.files_chunked += other.files_chunked;
        self.total_chunks_created += other.total_chunks_created;
        self.context_preservations += other.context_preservations;
        self.function_overlaps += other.function_overlaps;
        self.undersized_chunks += other.undersized_chunks;
    }
}

/// Accumulates lines into chunks, tracking the source range of each.
struct Packer<'a, E> {
    estimator: &'a E,
    max_tokens: usize,
    chunks: Vec<Chunk>,
    lines: Vec<&'a str>,
    start: usize,
    tokens: usize,
}

impl<'a, E: TokenEstimator> Packer<'a, E> {
    fn new(estimator: &'a E, max_tokens: usize) -> Self {
        Self {
            estimator,
            max_tokens,
            chunks: Vec::new(),
            lines: Vec::new(),
            start: 0,
            tokens: 0,
        }
    }

    fn next_id(&self) -> usize {
        self.chunks.len() + 1
    }

    fn fits(&self, tokens: usize) -> bool {
        self.tokens + tokens <= self.max_tokens
    }

    /// Append source lines beginning at line `at`.
    fn append(&mut self, at: usize, lines: &[&'a str], tokens: usize) {
        if self.lines.is_empty() {
            self.start = at;
        }
        self.lines.extend_from_slice(lines);
        self.tokens += tokens;
    }

    fn flush(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        let end = self.start + self.lines.len() - 1;
        let content = self.lines.join("\n");

        // Trailing blank lines join the previous chunk rather than stand
        // alone, unless that would push it over budget.
        let adjacent = self.chunks.last().and_then(|c| c.end_line).map(|e| e + 1) == Some(self.start);
        let merged = adjacent && content.trim().is_empty() && self.merge_into_previous(&content, end);
        if !merged {
            let estimated = self.estimator.estimate(&content);
            let id = self.next_id();
            self.chunks.push(Chunk::new(content, id, self.start..=end, estimated));
        }
        self.lines.clear();
        self.tokens = 0;
    }

    fn merge_into_previous(&mut self, blank: &str, end: usize) -> bool {
        let Some(prev) = self.chunks.last_mut() else {
            return false;
        };
        let content = format!("{}\n{}", prev.content, blank);
        let estimated = self.estimator.estimate(&content);
        if estimated > self.max_tokens {
            return false;
        }
        prev.content = content;
        prev.end_line = Some(end);
        prev.estimated_tokens = estimated;
        true
    }

    /// Split a span that is larger than a chunk, repeating the boundary's
    /// signature lines at the top of every part after the first.
    fn split_oversized(&mut self, at: usize, span: &[&'a str], boundary: &Boundary) {
        if span.is_empty() {
            return;
        }
        let last = at + span.len() - 1;
        let signature_start = boundary.signature_start.clamp(at, last);
        let signature_end = boundary.signature_end.clamp(signature_start, last);
        let signature = &span[signature_start - at..=signature_end - at];
        let signature_tokens = self.estimator.estimate(&signature.join("\n"));
        let first_id = self.next_id();

        let mut part_lines: Vec<&str> = Vec::new();
        let mut part_start = at;
        let mut part_tokens = 0;
        let mut parts: Vec<(Vec<&str>, RangeInclusive<usize>)> = Vec::new();

        for (offset, &line) in span.iter().enumerate() {
            let line_no = at + offset;
            let line_tokens = self.estimator.estimate(line);
            // The first part always runs through the whole signature.
            if part_lines.is_empty() || line_no <= signature_end || part_tokens + line_tokens <= self.max_tokens {
                part_lines.push(line);
                part_tokens += line_tokens;
            } else {
                parts.push((part_lines, part_start..=line_no - 1));
                part_lines = signature.to_vec();
                part_lines.push(line);
                part_start = line_no;
                part_tokens = signature_tokens + line_tokens;
            }
        }
        parts.push((part_lines, part_start..=last));

        let last_id = first_id + parts.len() - 1;
        for (index, (lines, range)) in parts.into_iter().enumerate() {
            let id = first_id + index;
            let content = lines.join("\n");
            let estimated = self.estimator.estimate(&content);
            let mut chunk = Chunk::new(content, id, range, estimated);
            chunk.context_info = Some(format!("{} {} (part {})", boundary.kind, boundary.name, index + 1));
            chunk.continuation_from = (id > first_id).then(|| id - 1);
            chunk.continues_to = (id < last_id).then(|| id + 1);
            self.chunks.push(chunk);
        }
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        let total = self.chunks.len();
        for chunk in &mut self.chunks {
            chunk.total_chunks = total;
        }
        self.chunks
    }
}

fn overlap_signature(boundary: &Boundary, language: Language) -> String {
    match language.family() {
        LanguageFamily::Structured => format!("def {}(...)", boundary.name),
        _ => format!("{}(...)", boundary.name),
    }
}

/// Splits content into context-preserving chunks.
pub struct SmartChunker<E = TokenCounter> {
    strategy: ChunkingStrategy,
    estimator: E,
    stats: ChunkerStats,
}

impl SmartChunker<TokenCounter> {
    /// Chunker with the given strategy and the default tiktoken encoding.
    pub fn new(strategy: ChunkingStrategy) -> Self {
        Self::with_estimator(strategy, TokenCounter::default())
    }
}

impl Default for SmartChunker<TokenCounter> {
    fn default() -> Self {
        Self::new(ChunkingStrategy::default())
    }
}

impl<E: TokenEstimator> SmartChunker<E> {
    pub fn with_estimator(strategy: ChunkingStrategy, estimator: E) -> Self {
        Self {
            strategy,
            estimator,
            stats: ChunkerStats::default(),
        }
    }

    pub fn strategy(&self) -> &ChunkingStrategy {
        &self.strategy
    }

    /// Split `content` into chunks of at most `max_tokens` where structure
    /// allows.
    ///
    /// Empty or whitespace-only content yields no chunks; content that fits
    /// yields one chunk covering everything. A chunk can exceed
    /// `max_tokens` only when a single line does, or through the repeated
    /// signature line and added annotations. Never fails: content that
    /// cannot be analysed is packed line by line.
    pub fn chunk_with_context(
        &mut self,
        content: &str,
        locator: &str,
        max_tokens: usize,
        priority: PriorityLevel,
        preserve_functions: bool,
    ) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let lines = split_lines(content);
        let total_tokens = self.estimator.estimate(content);
        if total_tokens <= max_tokens {
            let mut chunk = Chunk::new(content.to_string(), 1, 0..=lines.len() - 1, total_tokens);
            chunk.total_chunks = 1;
            return vec![chunk];
        }

        let language = detect_language(locator);
        let mut boundaries = if preserve_functions && self.strategy.preserve_functions {
            strategy_for(language).boundaries(content).unwrap_or_default()
        } else {
            Vec::new()
        };
        if !self.strategy.preserve_classes {
            boundaries.retain(|b| b.kind != BoundaryKind::Class);
        }
        trace!(locator, %priority, boundaries = boundaries.len(), "chunking");

        let mut chunks = self.pack(&lines, &boundaries, max_tokens);

        if self.strategy.overlap_functions && !boundaries.is_empty() {
            chunks = self.add_function_overlaps(chunks, &boundaries, language);
        }
        if self.strategy.include_context_headers {
            chunks = self.add_continuation_context(chunks, locator, language);
        }

        let undersized = chunks
            .iter()
            .filter(|c| c.estimated_tokens < self.strategy.min_chunk_size)
            .count();
        if undersized > 0 {
            debug!(locator, undersized, min = self.strategy.min_chunk_size, "undersized chunks");
        }

        self.stats.files_chunked += 1;
        self.stats.total_chunks_created += chunks.len();
        self.stats.undersized_chunks += undersized;
        debug!(locator, %language, chunks = chunks.len(), max_tokens, "chunked");

        chunks
    }

    /// Greedy packing that keeps spans starting on the current line whole.
    fn pack(&self, lines: &[&str], boundaries: &[Boundary], max_tokens: usize) -> Vec<Chunk> {
        let mut packer = Packer::new(&self.estimator, max_tokens);
        let last = lines.len().saturating_sub(1);
        let mut i = 0;

        while i < lines.len() {
            match boundaries.iter().find(|b| b.start_line == i) {
                Some(boundary) => {
                    let end = boundary.end_line.clamp(i, last);
                    let span = &lines[i..=end];
                    let span_tokens = self.estimator.estimate(&span.join("\n"));

                    if packer.fits(span_tokens) {
                        packer.append(i, span, span_tokens);
                    } else if span_tokens > max_tokens {
                        packer.flush();
                        packer.split_oversized(i, span, boundary);
                    } else {
                        packer.flush();
                        packer.append(i, span, span_tokens);
                    }
                    i = end + 1;
                }
                None => {
                    let line_tokens = self.estimator.estimate(lines[i]);
                    if !packer.fits(line_tokens) {
                        packer.flush();
                    }
                    packer.append(i, &lines[i..=i], line_tokens);
                    i += 1;
                }
            }
        }

        packer.finish()
    }

    /// Prepend markers for functions that cross a chunk's edges.
    fn add_function_overlaps(
        &mut self,
        chunks: Vec<Chunk>,
        boundaries: &[Boundary],
        language: Language,
    ) -> Vec<Chunk> {
        let marker = language.comment_marker();

        chunks
            .into_iter()
            .map(|mut chunk| {
                let (Some(start), Some(end)) = (chunk.start_line, chunk.end_line) else {
                    return chunk;
                };

                let overlaps: Vec<String> = boundaries
                    .iter()
                    .filter(|b| b.kind.is_callable())
                    .filter_map(|b| {
                        if b.start_line < start && b.end_line >= start {
                            Some(format!("{} Continued from: {}", marker, overlap_signature(b, language)))
                        } else if b.start_line >= start && b.start_line <= end && b.end_line > end {
                            Some(format!("{} Continues: {}", marker, overlap_signature(b, language)))
                        } else {
                            None
                        }
                    })
                    .take(self.strategy.max_context_lines)
                    .collect();

                if !overlaps.is_empty() {
                    chunk.content = format!("{}\n\n{}", overlaps.join("\n"), chunk.content);
                    chunk.estimated_tokens = self.estimator.estimate(&chunk.content);
                    self.stats.function_overlaps += 1;
                }
                chunk
            })
            .collect()
    }

    /// Add part headers and footers when there is more than one chunk.
    fn add_continuation_context(&mut self, chunks: Vec<Chunk>, locator: &str, language: Language) -> Vec<Chunk> {
        let total = chunks.len();
        if total <= 1 {
            return chunks;
        }

        let name = display_name(locator);
        let marker = language.comment_marker();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, mut chunk)| {
                let part = i + 1;
                let mut text = if i == 0 {
                    format!("{} {} (Part {}/{})\n", marker, name, part, total)
                } else {
                    let mut header = format!("{} Continuation of {} (Part {}/{})\n", marker, name, part, total);
                    if let Some(from) = chunk.continuation_from {
                        header.push_str(&format!("{} Continued from Part {}\n", marker, from));
                    }
                    header
                };
                text.push_str(&chunk.content);
                if part < total {
                    text.push_str(&format!("\n{} Continues in Part {}/{}...", marker, part + 1, total));
                }

                chunk.estimated_tokens = self.estimator.estimate(&text);
                chunk.content = text;
                if chunk.context_info.is_none() {
                    chunk.context_info = Some(format!("Part {} of {}", part, total));
                }
                self.stats.context_preservations += 1;
                chunk
            })
            .collect()
    }

    /// Recommend a per-chunk token size for splitting `content` into
    /// roughly `target_chunks` pieces within `total_budget` (commonly
    /// [`DEFAULT_TARGET_CHUNKS`]).
    ///
    /// Content that fits returns its own token count. Python favours fewer,
    /// larger chunks (x1.2, at most half the budget); JS/TS favours smaller
    /// ones (x0.8, at least 500).
    pub fn estimate_optimal_chunk_size(
        &self,
        content: &str,
        locator: &str,
        total_budget: usize,
        target_chunks: usize,
    ) -> usize {
        let total_tokens = self.estimator.estimate(content);
        if total_tokens <= total_budget {
            return total_tokens;
        }

        let base = total_budget / target_chunks.max(1);
        let language = detect_language(locator);
        match language.family() {
            LanguageFamily::Structured => ((base as f64 * 1.2) as usize).min(total_budget / 2),
            LanguageFamily::Brace if language.is_script() => ((base as f64 * 0.8) as usize).max(500),
            _ => base,
        }
    }

    pub fn stats(&self) -> &ChunkerStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ChunkerStats::default();
    }

    pub fn into_stats(self) -> ChunkerStats {
        self.stats
    }
}

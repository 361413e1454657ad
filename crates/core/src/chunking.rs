use crate::error::IngestError;
use crate::models::{IngestionOptions, TextChunk};
use sha2::{Digest, Sha256};

/// Break candidates, strongest first: paragraph, line, sentence, word.
const BOUNDARY_TIERS: [&[&str]; 4] = [&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(IngestionOptions::default())
    }
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Splits `text` into windows of at most `max_chars` characters where each window
/// starts exactly `overlap_chars` before the previous one ended.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        if chars.len() - start <= config.max_chars {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let hard_end = start + config.max_chars;
        // The cut must land past the overlap, otherwise the next window would not advance.
        let floor = start + config.overlap_chars.max(config.max_chars / 2) + 1;
        let end = find_boundary(&chars, floor, hard_end).unwrap_or(hard_end);

        chunks.push(chars[start..end].iter().collect());
        start = end - config.overlap_chars;
    }

    Ok(chunks)
}

fn find_boundary(chars: &[char], floor: usize, ceiling: usize) -> Option<usize> {
    for tier in BOUNDARY_TIERS {
        let best = tier
            .iter()
            .filter_map(|separator| last_separator_end(chars, separator, floor, ceiling))
            .max();
        if best.is_some() {
            return best;
        }
    }
    None
}

fn last_separator_end(chars: &[char], separator: &str, floor: usize, ceiling: usize) -> Option<usize> {
    let separator: Vec<char> = separator.chars().collect();
    (floor..=ceiling)
        .rev()
        .find(|&end| end >= separator.len() && chars[end - separator.len()..end] == separator[..])
}

pub fn build_chunks(text: &str, options: &IngestionOptions) -> Result<Vec<TextChunk>, IngestError> {
    let config = ChunkingConfig::from(options.clone());

    let chunks = split_text(text, config)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk {
            chunk_id: make_chunk_id(index as u64, &text),
            chunk_index: index as u64,
            text,
        })
        .collect();

    Ok(chunks)
}

fn make_chunk_id(index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

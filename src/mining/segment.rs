//! Line-preserving block segmentation.
//!
//! The corpus is walked line by line and packed into blocks whose line content stays within a
//! character budget. Newlines are not counted, lines are never split, and a single line longer
//! than the budget becomes its own oversized block.

use super::types::{Block, MiningError};

/// Split `text` into ordered blocks of at most `max_chars` characters of line content.
///
/// Returns an empty vector for empty input. A zero budget is rejected.
pub fn segment(text: &str, max_chars: usize) -> Result<Vec<Block>, MiningError> {
    if max_chars == 0 {
        return Err(MiningError::InvalidBlockSize);
    }

    let mut blocks = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut tally = 0usize;

    for line in text.lines() {
        let len = line.chars().count();
        if tally + len > max_chars && !lines.is_empty() {
            blocks.push(close_block(blocks.len() + 1, &lines, tally));
            lines.clear();
            tally = 0;
        }
        lines.push(line);
        tally += len;
    }

    if !lines.is_empty() {
        blocks.push(close_block(blocks.len() + 1, &lines, tally));
    }

    Ok(blocks)
}

fn close_block(index: usize, lines: &[&str], char_count: usize) -> Block {
    Block {
        index,
        text: lines.join("\n"),
        char_count,
    }
}

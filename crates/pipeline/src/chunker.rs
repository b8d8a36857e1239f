//! Sentence chunker
//!
//! Splits one generated response into short, speakable units so the
//! synthesis peer can start playback before the whole response is spoken.
//! Pure function of its input: no I/O, restartable, finite.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentence-terminal delimiters: ASCII and full-width punctuation plus
/// newline. Each match is retained with the segment that precedes it.
static DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,.;?!，。；？！\n]").expect("delimiter pattern is valid"));

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Model end-of-turn marker removed before splitting
    #[serde(default = "default_eot_marker")]
    pub eot_marker: String,
}

fn default_eot_marker() -> String {
    "<|im_end|>".to_string()
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            eot_marker: default_eot_marker(),
        }
    }
}

/// Splits generated text into ordered, punctuation-terminated chunks.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into speakable chunks, in original order.
    ///
    /// Ellipses are normalized to a single full-width period so no chunk is
    /// left unbounded. Every delimiter stays attached to the segment before
    /// it; a trailing fragment without terminal punctuation is kept
    /// verbatim. Chunks are trimmed and never empty.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim().replace(&self.config.eot_marker, "");
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Ellipsis is period-equivalent: '…' and '...' both collapse to '。'.
        let text = text.replace('…', "...").replace("...", "。");

        let mut chunks = Vec::new();
        let mut start = 0;

        for delimiter in DELIMITERS.find_iter(&text) {
            let segment = &text[start..delimiter.end()];
            if !segment.trim().is_empty() {
                chunks.push(segment.trim().to_string());
            }
            start = delimiter.end();
        }

        // Trailing fragment with no terminal punctuation.
        let tail = &text[start..];
        if !tail.trim().is_empty() {
            chunks.push(tail.trim().to_string());
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Vec<String> {
        TextChunker::default().chunk(text)
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(chunk("").is_empty());
        assert!(chunk("   ").is_empty());
        assert!(chunk("\n\t  \n").is_empty());
    }

    #[test]
    fn test_marker_only_input() {
        assert!(chunk("<|im_end|>").is_empty());
        assert!(chunk("  <|im_end|>  ").is_empty());
    }

    #[test]
    fn test_no_punctuation_single_chunk() {
        assert_eq!(chunk("Hello world"), vec!["Hello world"]);
    }

    #[test]
    fn test_delimiters_retained_in_order() {
        assert_eq!(chunk("Hi, there! Bye."), vec!["Hi,", "there!", "Bye."]);
    }

    #[test]
    fn test_marker_stripped_before_splitting() {
        assert_eq!(
            chunk("Hi there. How are you?<|im_end|>"),
            vec!["Hi there.", "How are you?"]
        );
    }

    #[test]
    fn test_ellipsis_is_single_terminator() {
        let chunks = chunk("Wait...");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Wait。");

        let chunks = chunk("Hmm… okay.");
        assert_eq!(chunks, vec!["Hmm。", "okay."]);
    }

    #[test]
    fn test_trailing_fragment_kept_verbatim() {
        assert_eq!(chunk("Done. And more"), vec!["Done.", "And more"]);
    }

    #[test]
    fn test_punctuation_only_input() {
        assert_eq!(chunk("!!!"), vec!["!", "!", "!"]);
    }

    #[test]
    fn test_full_width_delimiters() {
        assert_eq!(chunk("你好，世界。"), vec!["你好，", "世界。"]);
    }

    #[test]
    fn test_newline_is_a_delimiter() {
        assert_eq!(chunk("line one\nline two."), vec!["line one", "line two."]);
    }

    #[test]
    fn test_concatenation_preserves_content() {
        let input = "First.Second!Third?";
        let chunks = chunk(input);
        assert_eq!(chunks.concat(), input);
    }

    #[test]
    fn test_custom_eot_marker() {
        let chunker = TextChunker::new(ChunkerConfig {
            eot_marker: "</s>".to_string(),
        });
        assert_eq!(chunker.chunk("Hello.</s>"), vec!["Hello."]);
    }
}

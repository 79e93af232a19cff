use crate::node::StreamNode;

/// Separators used when none are configured: ASCII and full-width sentence
/// and clause punctuation plus the ASCII space.
pub const DEFAULT_SEPARATORS: &str = ",.:;?! ，。：；？！";

/// Splits a stream of text deltas into segments ending at a separator.
///
/// Each complete segment is emitted as soon as its separator arrives; the
/// unterminated tail stays buffered for the next call.
#[derive(Debug, Clone)]
pub struct SentenceSepNode {
    separators: Vec<char>,
    keep_separators: bool,
    buffer: String,
}

impl SentenceSepNode {
    pub fn new(separators: &str, keep_separators: bool) -> Self {
        Self {
            separators: separators.chars().collect(),
            keep_separators,
            buffer: String::new(),
        }
    }

    /// The pending, not yet terminated text.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn is_separator(&self, c: char) -> bool {
        self.separators.contains(&c)
    }
}

impl Default for SentenceSepNode {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATORS, true)
    }
}

impl StreamNode for SentenceSepNode {
    type Input = String;
    type Output = String;

    fn process(&mut self, input: String) -> Vec<String> {
        self.buffer.push_str(&input);

        let mut segments = Vec::new();
        let mut current = String::new();
        for c in self.buffer.chars() {
            if self.is_separator(c) {
                if self.keep_separators {
                    current.push(c);
                }
                segments.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }
        self.buffer = current;
        segments
    }

    fn flush(&mut self) -> Vec<String> {
        if self.buffer.is_empty() {
            Vec::new()
        } else {
            vec![std::mem::take(&mut self.buffer)]
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

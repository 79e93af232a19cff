use crate::node::StreamNode;
use serde::{Deserialize, Serialize};

/// Bracket pairs recognised when none are configured.
pub const DEFAULT_BRACKETS: &[(char, char)] = &[('[', ']'), ('【', '】')];

/// A classified unit of model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text meant to be spoken.
    Text { content: String },
    /// The inside of a bracket pair, e.g. `smile` for `[smile]`.
    Tag { content: String },
}

impl Segment {
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } | Self::Tag { content } => content,
        }
    }
}

/// Separates bracketed control tags from spoken text.
///
/// Sentence splitting happens upstream, so a tag such as `[wave, smile]` can
/// arrive split over several units. While a bracket is open its content is
/// buffered across calls until the matching close shows up.
#[derive(Debug, Clone)]
pub struct BracketsParsorNode {
    pairs: Vec<(char, char)>,
    /// The pair whose opening bracket is still unmatched.
    open: Option<(char, char)>,
    tag: String,
}

impl BracketsParsorNode {
    pub fn new(pairs: &[(char, char)]) -> Self {
        Self {
            pairs: pairs.to_vec(),
            open: None,
            tag: String::new(),
        }
    }

    /// Whether a bracket is open and waiting for its close.
    pub fn in_tag(&self) -> bool {
        self.open.is_some()
    }

    fn opening(&self, c: char) -> Option<(char, char)> {
        self.pairs.iter().copied().find(|(open, _)| *open == c)
    }
}

impl Default for BracketsParsorNode {
    fn default() -> Self {
        Self::new(DEFAULT_BRACKETS)
    }
}

fn push_text(out: &mut Vec<Segment>, text: &mut String) {
    let content = std::mem::take(text);
    if !content.trim().is_empty() {
        out.push(Segment::Text { content });
    }
}

impl StreamNode for BracketsParsorNode {
    type Input = String;
    type Output = Segment;

    fn process(&mut self, input: String) -> Vec<Segment> {
        let mut out = Vec::new();
        let mut text = String::new();

        for c in input.chars() {
            match self.open {
                Some((_, close)) if c == close => {
                    let content = std::mem::take(&mut self.tag).trim().to_string();
                    self.open = None;
                    if !content.is_empty() {
                        out.push(Segment::Tag { content });
                    }
                }
                Some(_) => self.tag.push(c),
                None => match self.opening(c) {
                    Some(pair) => {
                        push_text(&mut out, &mut text);
                        self.open = Some(pair);
                    }
                    None => text.push(c),
                },
            }
        }

        push_text(&mut out, &mut text);
        out
    }

    fn flush(&mut self) -> Vec<Segment> {
        let Some((open, _)) = self.open.take() else {
            return Vec::new();
        };
        let mut raw = String::new();
        raw.push(open);
        raw.push_str(&std::mem::take(&mut self.tag));
        let mut out = Vec::new();
        push_text(&mut out, &mut raw);
        out
    }

    fn reset(&mut self) {
        self.open = None;
        self.tag.clear();
    }
}

//! Pattern matching for prompt and auto-reply detection.

use indexmap::IndexMap;
use regex::Regex;

/// An ordered set of compiled patterns.
///
/// Each entry keeps the source string it was compiled from, since that is
/// what gets reported back to the caller when it matches.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<(String, Regex)>,
}

impl PatternSet {
    /// Compile each pattern in order.
    pub fn compile<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let source = p.as_ref();
                Regex::new(source).map(|re| (source.to_string(), re))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { patterns })
    }

    /// Index of the first pattern, in set order, that matches anywhere in
    /// `text`.
    pub fn find(&self, text: &str) -> Option<usize> {
        self.patterns.iter().position(|(_, re)| re.is_match(text))
    }

    /// Source string of the pattern at `index`.
    pub fn source(&self, index: usize) -> &str {
        &self.patterns[index].0
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Auto-reply patterns compiled alongside the text each one answers with.
#[derive(Debug, Clone, Default)]
pub struct AutoReplies {
    patterns: PatternSet,
    replies: Vec<String>,
}

impl AutoReplies {
    /// Compile an ordered pattern -> reply map.
    pub fn compile(map: &IndexMap<String, String>) -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: PatternSet::compile(map.keys())?,
            replies: map.values().cloned().collect(),
        })
    }

    /// Index of the first auto-reply pattern that matches `text`.
    pub fn find(&self, text: &str) -> Option<usize> {
        self.patterns.find(text)
    }

    /// Pattern source at `index`.
    pub fn pattern(&self, index: usize) -> &str {
        self.patterns.source(index)
    }

    /// Reply text at `index`.
    pub fn reply(&self, index: usize) -> &str {
        &self.replies[index]
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

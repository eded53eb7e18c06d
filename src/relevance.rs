//! Topic relevance filter.
//!
//! Decides whether a piece of text is about the configured topics by looking for
//! any of an ordered list of phrases as whole words, case-insensitively. The
//! first phrase (in list order) that occurs is reported back so records keep
//! track of why they were included.

use regex::{Regex, RegexBuilder};

/// Ordered, case-insensitive whole-word phrase matcher.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    phrases: Vec<(String, Regex)>,
}

impl RelevanceFilter {
    /// Compile one word-boundary pattern per phrase. Phrases are matched
    /// literally; regex metacharacters in them are escaped. Blank phrases are
    /// ignored.
    pub fn new<I, S>(phrases: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .filter(|p| !p.as_ref().trim().is_empty())
            .map(|p| {
                let phrase = p.as_ref().trim().to_string();
                let pattern = format!(r"\b{}\b", regex::escape(&phrase));
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (phrase, re))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { phrases })
    }

    /// Return the first configured phrase that occurs in `text` as whole words,
    /// or `None` when nothing matches.
    pub fn is_relevant(&self, text: &str) -> Option<&str> {
        self.phrases
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(phrase, _)| phrase.as_str())
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// True when no usable phrase was configured; such a filter rejects everything.
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

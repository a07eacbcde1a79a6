/// Accumulates the wrong answers and looked-up words of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MistakeTracker {
    wrong_indices: Vec<usize>,
    looked_up_words: Vec<String>,
}

impl MistakeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch position to the wrong list.
    ///
    /// Positions are not deduplicated: recording the same index twice keeps
    /// both entries.
    pub fn record_mistake(&mut self, index: usize) {
        self.wrong_indices.push(index);
    }

    /// Remember a word the user looked up.
    ///
    /// Surrounding whitespace of the selection is trimmed; otherwise the match
    /// is exact and case-sensitive. Returns `true` if the word was new.
    pub fn record_lookup(&mut self, word: &str) -> bool {
        let word = word.trim();
        if word.is_empty() || self.looked_up_words.iter().any(|w| w == word) {
            return false;
        }
        self.looked_up_words.push(word.to_owned());
        true
    }

    #[must_use]
    pub fn wrong_indices(&self) -> &[usize] {
        &self.wrong_indices
    }

    #[must_use]
    pub fn looked_up_words(&self) -> &[String] {
        &self.looked_up_words
    }

    #[must_use]
    pub fn mistake_count(&self) -> usize {
        self.wrong_indices.len()
    }
}

//! Text normalization and sentence-level chunking.
//!
//! Raw extracted text is noisy: PDF extractors emit hard line breaks and
//! column padding, web pages carry indentation and entity artifacts. This
//! module collapses whitespace runs to single spaces and segments the result
//! into sentences using UAX#29 sentence boundaries, which is what the rest of
//! the pipeline treats as the indexable chunk unit.

use unicode_segmentation::UnicodeSegmentation;

use crate::types::RagError;

/// A normalized document, iterable as a finite, restartable sequence of
/// non-empty sentences.
///
/// Construction fails with [`RagError::EmptyContent`] when nothing survives
/// normalization; callers must treat that as a hard failure for the source
/// rather than silently continuing with an empty chunk set.
///
/// # Examples
///
/// ```
/// use ragfuse::normalize::Sentences;
///
/// let sentences = Sentences::new("The sky is   blue.\n\nGrass is green.").unwrap();
/// let chunks: Vec<&str> = sentences.iter().collect();
/// assert_eq!(chunks, ["The sky is blue.", "Grass is green."]);
/// ```
#[derive(Debug, Clone)]
pub struct Sentences {
    text: String,
}

impl Sentences {
    /// Normalize `raw` and verify at least one sentence survives.
    pub fn new(raw: &str) -> Result<Self, RagError> {
        let text = collapse_whitespace(raw);
        let sentences = Self { text };
        if sentences.iter().next().is_none() {
            return Err(RagError::EmptyContent);
        }
        Ok(sentences)
    }

    /// Lazily yield the sentences of the normalized text.
    ///
    /// Segmentation runs anew on each call, so the sequence is restartable
    /// and borrows from `self` without allocation.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.text
            .unicode_sentences()
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
    }

    /// Number of sentences in the document.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` when the document holds no sentences. Unreachable for
    /// values produced by [`Sentences::new`], which rejects empty content.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// The whitespace-collapsed text backing the sentence sequence.
    pub fn normalized_text(&self) -> &str {
        &self.text
    }
}

/// Collapse all whitespace runs (spaces, tabs, newlines) to single spaces and
/// trim the ends.
fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for token in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_sentence_boundaries() {
        let sentences =
            Sentences::new("The sky is blue. Grass is green. Roses are red.").unwrap();
        let chunks: Vec<&str> = sentences.iter().collect();
        assert_eq!(
            chunks,
            ["The sky is blue.", "Grass is green.", "Roses are red."]
        );
    }

    #[test]
    fn collapses_interior_whitespace() {
        let sentences = Sentences::new("One\t\ttwo\n\nthree.   Four five.").unwrap();
        let chunks: Vec<&str> = sentences.iter().collect();
        assert_eq!(chunks, ["One two three.", "Four five."]);
    }

    #[test]
    fn iteration_is_restartable() {
        let sentences = Sentences::new("First. Second.").unwrap();
        let first_pass: Vec<&str> = sentences.iter().collect();
        let second_pass: Vec<&str> = sentences.iter().collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(Sentences::new(""), Err(RagError::EmptyContent)));
        assert!(matches!(
            Sentences::new(" \n\t  "),
            Err(RagError::EmptyContent)
        ));
    }

    #[test]
    fn single_sentence_without_terminator_survives() {
        let sentences = Sentences::new("no punctuation here").unwrap();
        assert_eq!(sentences.len(), 1);
    }

    proptest! {
        /// Sentences are non-empty, carry no whitespace runs, and dropping
        /// spaces from the joined sentences reproduces the normalized text
        /// minus its spaces: nothing inside a sentence is lost or reordered.
        #[test]
        fn normalization_only_loses_whitespace(raw in "\\PC{0,200}") {
            if let Ok(sentences) = Sentences::new(&raw) {
                let mut joined = String::new();
                for sentence in sentences.iter() {
                    prop_assert!(!sentence.is_empty());
                    prop_assert_eq!(sentence, sentence.trim());
                    prop_assert!(!sentence.contains("  "));
                    joined.push_str(sentence);
                }
                let squashed: String =
                    joined.chars().filter(|c| *c != ' ').collect();
                let expected: String = sentences
                    .normalized_text()
                    .chars()
                    .filter(|c| *c != ' ')
                    .collect();
                prop_assert_eq!(squashed, expected);
            }
        }
    }
}

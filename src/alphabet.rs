//! The fixed target alphabet
//!
//! Six Marathi letters, in the order that defines every label index in the
//! system. The ordered list is persisted once at collection time and read back
//! (never recomputed) by preprocessing and inference, so all three stages
//! share one bijection. The stored list's length and order must match the
//! label indices embedded in the persisted dataset; that cross-file
//! consistency is not validated automatically (a version/identity check is
//! a recommended hardening, not implemented here).

use serde::{Deserialize, Serialize};

/// Letters collected and recognised, in label-index order.
pub const DEFAULT_LETTERS: [&str; 6] = ["आ", "र", "ती", "वि", "शा", "ल"];

/// The ordered letter list defining the label-index bijection.
///
/// Letters are multi-codepoint glyph strings ("ती" is two codepoints), so
/// they are stored as `String`s, not `char`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alphabet {
    letters: Vec<String>,
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            letters: DEFAULT_LETTERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Alphabet {
    pub fn new(letters: Vec<String>) -> Self {
        Self { letters }
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Resolve a label index to its letter.
    pub fn letter(&self, index: usize) -> Option<&str> {
        self.letters.get(index).map(String::as_str)
    }

    /// Resolve a letter back to its label index.
    pub fn index_of(&self, letter: &str) -> Option<usize> {
        self.letters.iter().position(|l| l == letter)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.letters.iter().map(String::as_str)
    }
}

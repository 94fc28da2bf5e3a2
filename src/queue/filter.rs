//! Optional key-code filter applied on the producer side

use crate::keyboard::KeyCode;
use std::collections::HashSet;

/// Set of key codes a queue captures. Empty means every key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    codes: HashSet<KeyCode>,
}

impl KeyFilter {
    /// Filter that admits every key
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_codes<I, K>(codes: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyCode>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a flag vector where `flags[code] != 0` enables `code`.
    ///
    /// A vector with no enabled entries admits every key.
    pub fn from_flags(flags: &[i32]) -> Self {
        let codes = flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| **flag != 0)
            .filter_map(|(code, _)| u16::try_from(code).ok())
            .map(KeyCode)
            .collect();
        Self { codes }
    }

    /// Whether events for `key` should enter the queue
    pub fn allows(&self, key: KeyCode) -> bool {
        self.codes.is_empty() || self.codes.contains(&key)
    }

    pub fn is_all(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

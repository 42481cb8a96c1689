// SPDX-License-Identifier: MPL-2.0

//! The country denylist.
//!
//! A denylist file holds one two-letter, uppercase country code per line. Everything from the first
//! unescaped `#` to the end of a line is a comment, surrounding whitespace is ignored, and blank
//! lines are skipped:
//!
//! ```text
//! # Refuse connections from these countries.
//! FR
//! DE   # trailing comments are fine
//! ```

use std::{
    collections::{btree_set, BTreeSet},
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
};

use error_stack::{IntoReport as _, Report, Result, ResultExt as _};

use crate::CountryCode;

/// An error returned by [`Denylist::load`] and [`Denylist::from_reader`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to open denylist {}", .path.display())]
    Open { path: PathBuf },
    #[error("failed to read line {line} of denylist {}", .path.display())]
    Read { path: PathBuf, line: usize },
    #[error("{}:{line}: expected a two-letter uppercase country code, found {content:?}", .path.display())]
    Malformed { path: PathBuf, line: usize, content: String },
}

/// A set of country codes from which connections are refused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Denylist(BTreeSet<CountryCode>);

impl Denylist {
    /// Loads a denylist from the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .into_report()
            .change_context_lazy(|| LoadError::Open { path: path.to_owned() })?;

        Self::from_reader(io::BufReader::new(file), path)
    }

    /// Parses a denylist from `reader`.
    ///
    /// `path` is only used in error messages.
    pub fn from_reader(reader: impl BufRead, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let mut codes = BTreeSet::new();

        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let line = line
                .into_report()
                .change_context_lazy(|| LoadError::Read { path: path.to_owned(), line: line_no })?;

            let content = strip_comment(&line).trim();
            if content.is_empty() {
                continue;
            }

            let code = content.parse::<CountryCode>().map_err(|_| {
                Report::new(LoadError::Malformed {
                    path: path.to_owned(),
                    line: line_no,
                    content: content.to_owned(),
                })
            })?;
            codes.insert(code);
        }

        tracing::debug!("loaded {} country code(s) from {}", codes.len(), path.display());

        Ok(Self(codes))
    }

    pub fn contains(&self, code: &CountryCode) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the country codes in sorted order.
    pub fn iter(&self) -> btree_set::Iter<'_, CountryCode> {
        self.0.iter()
    }
}

impl FromIterator<CountryCode> for Denylist {
    fn from_iter<I: IntoIterator<Item = CountryCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Denylist {
    type Item = &'a CountryCode;
    type IntoIter = btree_set::Iter<'a, CountryCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cuts `line` at the first `#` that is not preceded by a backslash.
fn strip_comment(line: &str) -> &str {
    let mut prev = None;
    for (i, c) in line.char_indices() {
        if c == '#' && prev != Some('\\') {
            return &line[..i];
        }
        prev = Some(c);
    }

    line
}

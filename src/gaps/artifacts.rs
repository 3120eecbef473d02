// src/gaps/artifacts.rs

//! Matching of artifact-store names against contracts.

use std::collections::BTreeSet;

use crate::contract::Contract;

/// Artifact names seen in the store during one detection pass.
#[derive(Debug, Clone)]
pub struct KnownArtifacts {
    names: BTreeSet<String>,
    extension: String,
}

impl KnownArtifacts {
    /// Empty set recognising documents with the given extension
    /// (leading dot optional, case-insensitive).
    pub fn new(extension: &str) -> Self {
        Self {
            names: BTreeSet::new(),
            extension: normalize_extension(extension),
        }
    }

    pub fn with_names<I, S>(extension: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known = Self::new(extension);
        known.extend(names);
        known
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether some known artifact is the document for this contract.
    pub fn has_document_for(&self, contract: &Contract) -> bool {
        match contract.solicitation() {
            Some(solicitation) => self
                .names
                .iter()
                .any(|name| artifact_matches(name, solicitation, &self.extension)),
            None => false,
        }
    }
}

/// An artifact belongs to a solicitation when its name contains the
/// solicitation identifier and ends with the document extension. Both
/// comparisons ignore case.
pub fn artifact_matches(name: &str, solicitation: &str, extension: &str) -> bool {
    let name = name.to_lowercase();
    let solicitation = solicitation.trim().to_lowercase();
    if solicitation.is_empty() {
        return false;
    }
    let suffix = format!(".{}", normalize_extension(extension));
    name.contains(&solicitation) && name.ends_with(&suffix)
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

//! Ordered record of files an export produced.
//!
//! Paths are relative to the export target directory, in the order they
//! were first written. The publish step uploads exactly these files.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    files: Vec<String>,
    seen: HashSet<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name` unless already recorded. Returns whether it was new.
    pub fn push(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.seen.contains(&name) {
            return false;
        }
        self.seen.insert(name.clone());
        self.files.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut m = Manifest::new();
        m.push("site.css");
        m.push("index.htm");
        m.push("00001_l.jpg");
        assert_eq!(m.files(), ["site.css", "index.htm", "00001_l.jpg"]);
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let mut m = Manifest::new();
        assert!(m.push("mouseover.js"));
        assert!(!m.push("mouseover.js"));
        assert_eq!(m.len(), 1);
        assert!(m.contains("mouseover.js"));
    }

    #[test]
    fn empty_manifest() {
        let m = Manifest::new();
        assert!(m.is_empty());
        assert_eq!(m.iter().count(), 0);
    }
}

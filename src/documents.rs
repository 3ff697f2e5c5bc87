/// A document known to the server, keyed by filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub filename: String,
}

/// Visible document list; filenames are unique and keep insertion order.
#[derive(Debug, Default, Clone)]
pub struct DocumentList {
    entries: Vec<DocumentEntry>,
}

impl DocumentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the filename is already listed.
    pub fn add(&mut self, filename: impl Into<String>) -> bool {
        let filename = filename.into();
        if self.contains(&filename) {
            return false;
        }
        self.entries.push(DocumentEntry { filename });
        true
    }

    pub fn remove(&mut self, filename: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.filename != filename);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.iter().any(|e| e.filename == filename)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_by_filename() {
        let mut list = DocumentList::new();
        assert!(list.add("a.pdf"));
        assert!(list.add("b.txt"));
        assert!(!list.add("a.pdf"));
        assert_eq!(list.len(), 2);
        let names: Vec<_> = list.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut list = DocumentList::new();
        list.add("a.pdf");
        list.add("b.txt");
        assert!(list.remove("a.pdf"));
        assert!(!list.remove("a.pdf"));
        assert!(!list.is_empty());
        list.clear();
        assert!(list.is_empty());
    }
}

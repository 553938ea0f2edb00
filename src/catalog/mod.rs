//! Persistent book catalog.
//!
//! The catalog is the full set of books and notes ingested so far. It is
//! loaded once at startup from a JSON file and written back after every
//! upsert. Books are never removed, so the catalog only grows.
//!
//! # File format
//!
//! ```json
//! [
//!   {
//!     "Author": "Austen",
//!     "Title": "Pride And Prejudice",
//!     "Notes": [ { "Location": "584", "Text": "It Is A Truth" } ]
//!   }
//! ]
//! ```

pub mod merge;

pub use merge::merge_new_notes;

use crate::clippings::ClippingsDocument;
use crate::models::{Book, Note};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing the catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize catalog: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to deserialize catalog {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What an upsert did to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogChange {
    BookCreated {
        author: String,
        title: String,
        notes_added: usize,
    },
    NotesAdded {
        author: String,
        title: String,
        notes_added: usize,
    },
    Unchanged {
        author: String,
        title: String,
    },
}

impl CatalogChange {
    pub fn notes_added(&self) -> usize {
        match self {
            CatalogChange::BookCreated { notes_added, .. }
            | CatalogChange::NotesAdded { notes_added, .. } => *notes_added,
            CatalogChange::Unchanged { .. } => 0,
        }
    }

    pub fn is_new_book(&self) -> bool {
        matches!(self, CatalogChange::BookCreated { .. })
    }
}

/// In-memory catalog bound to its backing JSON file.
#[derive(Debug)]
pub struct BookCatalog {
    path: PathBuf,
    books: Vec<Book>,
}

impl BookCatalog {
    /// Create an empty catalog that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            books: Vec::new(),
        }
    }

    /// Load the catalog stored at `path`.
    ///
    /// A missing file is a fresh start, not an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();

        if !path.exists() {
            log::info!("no catalog at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }

        let content = std::fs::read(&path).map_err(|e| CatalogError::io(&path, e))?;
        let books: Vec<Book> =
            serde_json::from_slice(&content).map_err(|source| CatalogError::Deserialize {
                path: path.clone(),
                source,
            })?;

        log::info!("loaded {} book(s) from {}", books.len(), path.display());

        Ok(Self { path, books })
    }

    /// Write the full catalog to its file as indented JSON.
    ///
    /// The content goes to a temporary file next to the target which is then
    /// renamed over it, so a crash mid-write leaves the previous file intact.
    pub fn save(&self) -> Result<(), CatalogError> {
        let serialized =
            serde_json::to_vec_pretty(&self.books).map_err(CatalogError::Serialize)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| CatalogError::io(&dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| CatalogError::io(&dir, e))?;
        tmp.write_all(&serialized)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| CatalogError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| CatalogError::io(&self.path, e.error))?;

        log::debug!(
            "saved {} book(s) to {} ({} bytes)",
            self.books.len(),
            self.path.display(),
            serialized.len()
        );

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Find a book by author and title, ignoring case.
    pub fn find_by_identity(&self, author: &str, title: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.matches(author, title))
    }

    /// Merge a parsed document into the catalog and persist it.
    ///
    /// Creates the book when it is not known yet, otherwise appends only the
    /// notes at new locations. If saving fails the in-memory catalog is
    /// rolled back so it keeps matching what is on disk.
    pub fn upsert(&mut self, document: &ClippingsDocument) -> Result<CatalogChange, CatalogError> {
        let position = self
            .books
            .iter()
            .position(|book| book.matches(&document.author, &document.title));

        let change = match position {
            None => {
                let mut book = Book::new(&document.author, &document.title);
                let existing = HashSet::new();
                book.notes = merge_new_notes(&existing, &document.highlights)
                    .into_iter()
                    .map(|h| Note::new(&h.location, &h.text))
                    .collect();

                let notes_added = book.notes.len();
                self.books.push(book);

                if let Err(e) = self.save() {
                    self.books.pop();
                    return Err(e);
                }

                CatalogChange::BookCreated {
                    author: document.author.clone(),
                    title: document.title.clone(),
                    notes_added,
                }
            }
            Some(index) => {
                let book = &mut self.books[index];
                let previous_len = book.notes.len();

                let new_notes: Vec<Note> = {
                    let existing: HashSet<&str> =
                        book.notes.iter().map(|n| n.location.as_str()).collect();
                    merge_new_notes(&existing, &document.highlights)
                        .into_iter()
                        .map(|h| Note::new(&h.location, &h.text))
                        .collect()
                };
                let notes_added = new_notes.len();
                book.notes.extend(new_notes);

                let (author, title) = (book.author.clone(), book.title.clone());

                if let Err(e) = self.save() {
                    self.books[index].notes.truncate(previous_len);
                    return Err(e);
                }

                if notes_added == 0 {
                    CatalogChange::Unchanged { author, title }
                } else {
                    CatalogChange::NotesAdded {
                        author,
                        title,
                        notes_added,
                    }
                }
            }
        };

        log::info!("catalog change: {:?}", change);
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clippings::Highlight;
    use tempfile::TempDir;

    fn document(author: &str, title: &str, locations: &[&str]) -> ClippingsDocument {
        ClippingsDocument {
            title: title.to_string(),
            author: author.to_string(),
            highlights: locations
                .iter()
                .map(|l| Highlight::new(*l, format!("Text {l}")))
                .collect(),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = BookCatalog::load(dir.path().join("books.json")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("books.json");
        std::fs::write(&path, "not json").unwrap();
        let err = BookCatalog::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Deserialize { .. }));
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("books.json");
        let mut catalog = BookCatalog::load(&path).unwrap();

        let change = catalog.upsert(&document("Austen", "Emma", &["100"])).unwrap();
        assert!(change.is_new_book());
        assert_eq!(change.notes_added(), 1);

        let change = catalog
            .upsert(&document("AUSTEN", "emma", &["100", "200"]))
            .unwrap();
        assert_eq!(
            change,
            CatalogChange::NotesAdded {
                author: "Austen".to_string(),
                title: "Emma".to_string(),
                notes_added: 1,
            }
        );

        let book = catalog.find_by_identity("austen", "EMMA").unwrap();
        let locations: Vec<_> = book.notes.iter().map(|n| n.location.as_str()).collect();
        assert_eq!(locations, vec!["100", "200"]);

        let reloaded = BookCatalog::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.books()[0].notes.len(), 2);
    }

    #[test]
    fn test_upsert_same_document_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("books.json");
        let mut catalog = BookCatalog::new(&path);
        let doc = document("Austen", "Emma", &["1", "2"]);

        catalog.upsert(&doc).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let change = catalog.upsert(&doc).unwrap();
        assert_eq!(change.notes_added(), 0);
        assert!(matches!(change, CatalogChange::Unchanged { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the final rename fail
        let path = dir.path().join("books.json");
        std::fs::create_dir(&path).unwrap();

        let mut catalog = BookCatalog::new(&path);
        let err = catalog.upsert(&document("A", "T", &["1"])).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("books.json");
        let mut catalog = BookCatalog::new(&path);
        catalog.upsert(&document("A", "T", &["1"])).unwrap();
        assert!(path.exists());
    }
}

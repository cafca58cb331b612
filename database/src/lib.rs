use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::Display,
    io::{self, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
    time,
};
use tempfile::NamedTempFile;

#[macro_use]
extern crate log;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub type ShoppingListDatabase = Database<model::ShoppingList>;

/// A single JSON document stored in a single file.
///
/// There is no locking between [`Database::load`] and [`Database::save`]; two
/// overlapping read-modify-write cycles end with whichever saved last.
pub struct Database<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> Database<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Database<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Reads the whole document. A missing or unreadable file yields the default (empty) document.
    pub async fn load(&self) -> T {
        trace!("loading document from '{}'", self.path.display());
        let timer = time::Instant::now();

        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(
                    "'{}' does not exist yet, starting with an empty document",
                    self.path.display()
                );
                return T::default();
            }
            Err(error) => {
                warn!(
                    "failed to read '{}', starting with an empty document: {}",
                    self.path.display(),
                    error
                );
                return T::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(document) => {
                trace!(
                    "loaded document from '{}' in {:?}",
                    self.path.display(),
                    timer.elapsed()
                );
                document
            }
            Err(error) => {
                warn!(
                    "failed to parse '{}', starting with an empty document: {}",
                    self.path.display(),
                    error
                );
                T::default()
            }
        }
    }

    /// Replaces the file with `document`, pretty-printed.
    ///
    /// The new content goes to a temporary file next to the target which is then
    /// renamed over it, so a failed write never leaves a truncated document behind.
    pub async fn save(&self, document: &T) -> DatabaseResult<()> {
        let content = serde_json::to_vec_pretty(document)?;
        let path = self.path.clone();
        let timer = time::Instant::now();

        tokio::task::spawn_blocking(move || atomic_write(&path, &content)).await??;

        trace!(
            "saved document to '{}' in {:?}",
            self.path.display(),
            timer.elapsed()
        );
        Ok(())
    }
}

fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Debug)]
pub enum DatabaseError {
    Io(io::Error),
    Serialize(serde_json::Error),
    Task(tokio::task::JoinError),
}

impl From<io::Error> for DatabaseError {
    fn from(io_error: io::Error) -> Self {
        DatabaseError::Io(io_error)
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(serde_error: serde_json::Error) -> Self {
        DatabaseError::Serialize(serde_error)
    }
}

impl From<tokio::task::JoinError> for DatabaseError {
    fn from(join_error: tokio::task::JoinError) -> Self {
        DatabaseError::Task(join_error)
    }
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            DatabaseError::Io(e) => format!("i/o error: {}", e),
            DatabaseError::Serialize(e) => format!("could not serialize document: {}", e),
            DatabaseError::Task(e) => format!("writer task failed: {}", e),
        };

        write!(f, "{}", output)
    }
}

impl std::error::Error for DatabaseError {}

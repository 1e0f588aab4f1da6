use std::io::Result;
use std::path::{Path, PathBuf};

/// Classification of a path on disk. Missing paths and special files (FIFOs,
/// sockets, ...) are both `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PathKind {
  File,
  Directory,
  Other,
}

pub trait FileSystem: Send + Sync {
  fn kind(&self, path: &Path) -> PathKind;
  fn read_to_string(&self, path: &Path) -> Result<String>;
  fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

#[derive(Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn kind(&self, path: &Path) -> PathKind {
    match std::fs::metadata(path) {
      Ok(metadata) if metadata.is_file() => PathKind::File,
      Ok(metadata) if metadata.is_dir() => PathKind::Directory,
      _ => PathKind::Other,
    }
  }

  fn read_to_string(&self, path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
  }

  fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path)
  }
}

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use xxhash_rust::xxh3::Xxh3Builder;

use crate::fs::{FileSystem, PathKind};
use crate::package_json::{PackageConfig, PackageJson, PackageJsonError};
use crate::path::normalize_path;
use crate::tsconfig::TsConfig;
use crate::{PackageFilter, ResolverError};

const MAX_EXTENDS_DEPTH: u32 = 32;

/// Process-wide memoization for filesystem probes and parsed config files.
/// Entries are written once per key and only removed wholesale via `clear`,
/// which hosts call between builds or watch cycles.
pub struct Cache {
  pub fs: Arc<dyn FileSystem>,
  path_kinds: DashMap<PathBuf, PathKind, Xxh3Builder>,
  realpaths: DashMap<PathBuf, PathBuf, Xxh3Builder>,
  packages: DashMap<PathBuf, Result<Arc<PackageConfig>, ResolverError>, Xxh3Builder>,
  tsconfigs: DashMap<PathBuf, Result<Arc<TsConfig>, ResolverError>, Xxh3Builder>,
}

impl std::fmt::Debug for Cache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Cache").finish()
  }
}

/// Special Cow implementation for a Cache that doesn't require Clone, so many
/// short-lived resolver sessions can share one process-wide cache.
pub enum CacheCow<'a> {
  Borrowed(&'a Cache),
  Owned(Cache),
}

impl<'a> Deref for CacheCow<'a> {
  type Target = Cache;

  fn deref(&self) -> &Self::Target {
    match self {
      CacheCow::Borrowed(c) => c,
      CacheCow::Owned(c) => c,
    }
  }
}

impl Cache {
  pub fn new(fs: Arc<dyn FileSystem>) -> Self {
    Self {
      fs,
      path_kinds: DashMap::default(),
      realpaths: DashMap::default(),
      packages: DashMap::default(),
      tsconfigs: DashMap::default(),
    }
  }

  /// Drop every cache. Safe to call between resolution sessions in
  /// long-running processes.
  pub fn clear(&self) {
    self.path_kinds.clear();
    self.realpaths.clear();
    self.packages.clear();
    self.tsconfigs.clear();
  }

  pub fn kind(&self, path: &Path) -> PathKind {
    if let Some(kind) = self.path_kinds.get(path) {
      return *kind;
    }
    let kind = self.fs.kind(path);
    *self.path_kinds.entry(path.to_owned()).or_insert(kind).value()
  }

  pub fn is_file(&self, path: &Path) -> bool {
    self.kind(path) == PathKind::File
  }

  pub fn is_dir(&self, path: &Path) -> bool {
    self.kind(path) == PathKind::Directory
  }

  /// Resolve symlinks, falling back to the (normalized) input when the file
  /// does not exist.
  pub fn canonicalize(&self, path: &Path) -> PathBuf {
    let normalized = normalize_path(path);
    if let Some(real) = self.realpaths.get(&normalized) {
      return real.clone();
    }
    let real = self
      .fs
      .canonicalize(&normalized)
      .unwrap_or_else(|_| normalized.clone());
    self
      .realpaths
      .entry(normalized)
      .or_insert(real)
      .value()
      .clone()
  }

  /// Read and cache a package manifest, keyed by canonical path. A missing
  /// file is a valid `exists: false` snapshot, not an error.
  pub fn read_package(
    &self,
    manifest_path: &Path,
    package_filter: Option<&Arc<PackageFilter>>,
  ) -> Result<Arc<PackageConfig>, ResolverError> {
    let canonical = self.canonicalize(manifest_path);
    if let Some(entry) = self.packages.get(&canonical) {
      return entry.value().clone();
    }
    let computed = self.load_package(&canonical, package_filter);
    self
      .packages
      .entry(canonical)
      .or_insert(computed)
      .value()
      .clone()
  }

  fn load_package(
    &self,
    path: &Path,
    package_filter: Option<&Arc<PackageFilter>>,
  ) -> Result<Arc<PackageConfig>, ResolverError> {
    if self.kind(path) != PathKind::File {
      return Ok(Arc::new(PackageConfig::missing(path.to_owned())));
    }

    let data = self.fs.read_to_string(path)?;
    let mut raw: Value =
      serde_json::from_str(&data).map_err(|err| ResolverError::InvalidPackageConfig {
        path: path.to_owned(),
        message: err.to_string(),
        from: None,
      })?;

    if let Some(filter) = package_filter {
      raw = filter(raw, path);
      if !raw.is_object() {
        return Err(ResolverError::InvalidPackageConfig {
          path: path.to_owned(),
          message: "package filter returned a non-object value".to_owned(),
          from: None,
        });
      }
    }

    let package = PackageJson::from_value(path.to_owned(), raw).map_err(|err| match err {
      PackageJsonError::InvalidPackageConfig { message } => ResolverError::InvalidPackageConfig {
        path: path.to_owned(),
        message,
        from: None,
      },
      other => ResolverError::from_package_json(other, path, path),
    })?;

    Ok(Arc::new(PackageConfig {
      path: path.to_owned(),
      package,
      exists: true,
    }))
  }

  /// Read and cache a build-config file, merging relative `extends` chains.
  pub fn read_tsconfig(&self, path: &Path) -> Result<Arc<TsConfig>, ResolverError> {
    self.read_tsconfig_with_depth(path, 0)
  }

  fn read_tsconfig_with_depth(
    &self,
    path: &Path,
    depth: u32,
  ) -> Result<Arc<TsConfig>, ResolverError> {
    let canonical = self.canonicalize(path);
    if let Some(entry) = self.tsconfigs.get(&canonical) {
      return entry.value().clone();
    }
    let computed = self.load_tsconfig(&canonical, depth);
    self
      .tsconfigs
      .entry(canonical)
      .or_insert(computed)
      .value()
      .clone()
  }

  fn load_tsconfig(&self, path: &Path, depth: u32) -> Result<Arc<TsConfig>, ResolverError> {
    if depth > MAX_EXTENDS_DEPTH {
      return Err(ResolverError::InvalidPackageConfig {
        path: path.to_owned(),
        message: "\"extends\" chain is too deep".to_owned(),
        from: None,
      });
    }

    let data = self.fs.read_to_string(path)?;
    let mut tsconfig =
      TsConfig::parse(path.to_owned(), &data).map_err(|err| ResolverError::InvalidPackageConfig {
        path: path.to_owned(),
        message: err.to_string(),
        from: None,
      })?;

    if let Some(extends) = tsconfig.extends.clone() {
      if let Some(base_path) = self.resolve_extends(path, &extends) {
        let base = self.read_tsconfig_with_depth(&base_path, depth + 1)?;
        tsconfig.merge_missing(&base);
      }
    }

    Ok(Arc::new(tsconfig))
  }

  /// Locate a relative or absolute `extends` target. "." and ".." implicitly
  /// refer to a tsconfig.json file, and a missing ".json" extension is
  /// appended when the file doesn't exist without it. Bare-package targets
  /// and unlocatable files are ignored.
  fn resolve_extends(&self, from: &Path, extends: &str) -> Option<PathBuf> {
    if !extends.starts_with('.') && !Path::new(extends).is_absolute() {
      return None;
    }

    let dir = from.parent().unwrap_or_else(|| Path::new("/"));
    let mut target = normalize_path(&dir.join(extends));
    if extends == "." || extends == ".." {
      target.push("tsconfig.json");
    }

    if self.is_file(&target) {
      return Some(target);
    }

    if target.extension().map_or(true, |ext| ext != "json") {
      let mut with_json = target.into_os_string();
      with_json.push(".json");
      let target = PathBuf::from(with_json);
      if self.is_file(&target) {
        return Some(target);
      }
    }

    None
  }
}

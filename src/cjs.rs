use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builtins::is_builtin;
use crate::error::ResolverError;
use crate::package_json::{
  EsmMatch, ExportsCondition, ExportsField, PackageConfig, TargetResolution,
};
use crate::path::normalize_path;
use crate::specifier::parse_package_name;
use crate::trace_step;
use crate::{ResolveRequest, Resolution};

/// Require-style evaluation always runs under these conditions, regardless of
/// the session's configured set.
fn cjs_conditions() -> ExportsCondition {
  ExportsCondition::NODE | ExportsCondition::REQUIRE
}

fn is_relative_request(request: &str) -> bool {
  request.starts_with("./")
    || request.starts_with("../")
    || request.starts_with('/')
    || is_drive_letter(request)
}

fn is_drive_letter(request: &str) -> bool {
  let bytes = request.as_bytes();
  bytes.len() >= 3
    && bytes[0].is_ascii_alphabetic()
    && bytes[1] == b':'
    && (bytes[2] == b'/' || bytes[2] == b'\\')
}

fn is_script_ext(ext: &str) -> bool {
  matches!(ext, ".js" | ".jsx" | ".mjs" | ".cjs")
}

fn is_typed_ext(ext: &str) -> bool {
  matches!(ext, ".ts" | ".tsx" | ".mts" | ".cts")
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
  let mut s = path.as_os_str().to_os_string();
  s.push(ext);
  PathBuf::from(s)
}

impl<'a> ResolveRequest<'a> {
  /// require(X) from the module at the referrer path. Returns an absolute
  /// canonical path or a builtin.
  pub(crate) fn commonjs_resolve(&self, request: &str) -> Result<Resolution, ResolverError> {
    trace_step!(self, request, from = %self.from.display(), "commonjs_resolve");

    // Builtin names resolve verbatim with no filesystem access.
    if is_builtin(request) {
      return Ok(Resolution::Builtin(request.to_owned()));
    }

    let cache = &self.resolver.cache;

    // A request rooted at "/" treats the referrer as the filesystem root.
    let referrer: &Path = if request.starts_with('/') {
      Path::new("/")
    } else {
      &self.from
    };

    let base = cache.canonicalize(&self.resolver.options.basedir);
    let absolute_referrer = if referrer.is_absolute() {
      cache.canonicalize(referrer)
    } else {
      cache.canonicalize(&normalize_path(&base.join(referrer)))
    };
    let referrer_dir = match absolute_referrer.parent() {
      Some(dir) => dir.to_path_buf(),
      None => absolute_referrer,
    };

    if is_relative_request(request) {
      let joined = normalize_path(&referrer_dir.join(request));
      // A request ending in "/" resolves only as a directory.
      let wants_directory = request.ends_with('/');

      let mut found = None;
      if !wants_directory {
        found = self.load_as_file(&joined);
      }
      if found.is_none() {
        found = self.load_as_directory(&joined)?;
      }
      if let Some(path) = found {
        return Ok(Resolution::Path(cache.canonicalize(&path)));
      }
      // Relative and absolute misses are terminal; no node_modules search.
      return Err(ResolverError::ModuleNotFound {
        request: request.to_owned(),
        from: self.from.clone(),
      });
    }

    let found = if request.starts_with('#') {
      self.load_package_imports(request, &referrer_dir)?
    } else {
      match self.load_package_self(request, &referrer_dir)? {
        Some(resolution) => Some(resolution),
        None => self.load_node_modules(request, &referrer_dir)?,
      }
    };

    match found {
      Some(Resolution::Path(path)) => Ok(Resolution::Path(cache.canonicalize(&path))),
      Some(resolution) => Ok(resolution),
      None => Err(ResolverError::ModuleNotFound {
        request: request.to_owned(),
        from: self.from.clone(),
      }),
    }
  }

  /// Exact file first, then each configured extension in priority order, then
  /// typed-source substitutions for script extensions.
  pub(crate) fn load_as_file(&self, path: &Path) -> Option<PathBuf> {
    let cache = &self.resolver.cache;
    if cache.is_file(path) {
      return Some(path.to_owned());
    }

    let extensions = &self.resolver.options.extensions;
    for ext in extensions {
      let candidate = append_ext(path, ext);
      if cache.is_file(&candidate) {
        return Some(candidate);
      }
    }

    // A ".js"-style request may be satisfied by the typed source next to it.
    if let Some(path_str) = path.to_str() {
      for ext in extensions.iter().filter(|e| is_script_ext(e)) {
        if let Some(stem) = path_str.strip_suffix(ext.as_str()) {
          for typed in extensions.iter().filter(|e| is_typed_ext(e)) {
            let candidate = PathBuf::from(format!("{}{}", stem, typed));
            if cache.is_file(&candidate) {
              return Some(candidate);
            }
          }
        }
      }
    }

    None
  }

  pub(crate) fn load_index(&self, dir: &Path) -> Option<PathBuf> {
    for ext in &self.resolver.options.extensions {
      let candidate = dir.join(format!("index{}", ext));
      if self.resolver.cache.is_file(&candidate) {
        return Some(candidate);
      }
    }
    None
  }

  /// Directory load via the manifest's "main", with the deprecated index
  /// fallbacks. A declared "main" that loads nothing is terminal; it does not
  /// fall through to further candidates.
  pub(crate) fn load_as_directory(&self, dir: &Path) -> Result<Option<PathBuf>, ResolverError> {
    let config = self.read_package(&dir.join("package.json"))?;
    if config.exists {
      if let Some(main) = &config.package.main {
        let target = normalize_path(&dir.join(main));
        if let Some(path) = self.load_as_file(&target) {
          return Ok(Some(path));
        }
        if let Some(path) = self.load_index(&target) {
          return Ok(Some(path));
        }
        // deprecated
        if let Some(path) = self.load_index(dir) {
          return Ok(Some(path));
        }
        return Err(ResolverError::ModuleNotFound {
          request: dir.display().to_string(),
          from: self.from.clone(),
        });
      }
    }
    Ok(self.load_index(dir))
  }

  /// Ancestor node_modules directories, nearest first. Directories that are
  /// themselves named node_modules contribute no candidate of their own.
  pub(crate) fn node_modules_paths(&self, start: &Path) -> Vec<PathBuf> {
    start
      .ancestors()
      .filter(|dir| dir.file_name().map_or(true, |name| name != "node_modules"))
      .map(|dir| dir.join("node_modules"))
      .collect()
  }

  fn load_node_modules(
    &self,
    request: &str,
    start: &Path,
  ) -> Result<Option<Resolution>, ResolverError> {
    for dir in self.node_modules_paths(start) {
      // The exports map is consulted before any legacy file/directory probe.
      if let Some(resolution) = self.load_package_exports(request, &dir)? {
        return Ok(Some(resolution));
      }
      let candidate = dir.join(request);
      if let Some(path) = self.load_as_file(&candidate) {
        return Ok(Some(Resolution::Path(path)));
      }
      if let Some(path) = self.load_as_directory(&candidate)? {
        return Ok(Some(Resolution::Path(path)));
      }
    }
    Ok(None)
  }

  fn load_package_imports(
    &self,
    request: &str,
    dir: &Path,
  ) -> Result<Option<Resolution>, ResolverError> {
    let scope = self.find_package_config(dir)?;
    if !scope.exists || scope.package.imports.is_none() {
      return Ok(None);
    }

    trace_step!(self, request, scope = %scope.path.display(), "load_package_imports");
    let matched = scope
      .package
      .resolve_package_imports(request, cjs_conditions(), &[])
      .map_err(|err| ResolverError::from_package_json(err, &scope.path, &self.from))?;
    self.resolve_esm_match(matched, &scope).map(Some)
  }

  fn load_package_exports(
    &self,
    request: &str,
    dir: &Path,
  ) -> Result<Option<Resolution>, ResolverError> {
    let package_name = match parse_package_name(request) {
      Ok(parsed) => parsed,
      Err(_) => return Ok(None),
    };

    let config = self.read_package(&dir.join(package_name.name).join("package.json"))?;
    if !config.exists || !config.package.has_exports() {
      return Ok(None);
    }

    trace_step!(self, request, package = %config.path.display(), "load_package_exports");
    let matched = config
      .package
      .resolve_package_exports(&package_name.subpath, cjs_conditions(), &[])
      .map_err(|err| ResolverError::from_package_json(err, &config.path, &self.from))?;
    self.resolve_esm_match(matched, &config).map(Some)
  }

  /// Does the enclosing package export itself under this request's name?
  fn load_package_self(
    &self,
    request: &str,
    dir: &Path,
  ) -> Result<Option<Resolution>, ResolverError> {
    let scope = self.find_package_config(dir)?;
    if !scope.exists {
      return Ok(None);
    }
    let package = &scope.package;
    if matches!(package.exports, ExportsField::None | ExportsField::Null) {
      return Ok(None);
    }
    let name = match &package.name {
      Some(name) => name,
      None => return Ok(None),
    };
    let matches_name = request == name.as_str()
      || request
        .strip_prefix(name.as_str())
        .map_or(false, |rest| rest.starts_with('/'));
    if !matches_name {
      return Ok(None);
    }

    trace_step!(self, request, package = %scope.path.display(), "load_package_self");
    let subpath = format!(".{}", &request[name.len()..]);
    let matched = package
      .resolve_package_exports(&subpath, cjs_conditions(), &[])
      .map_err(|err| ResolverError::from_package_json(err, &scope.path, &self.from))?;
    self.resolve_esm_match(matched, &scope).map(Some)
  }

  /// Probe an exports/imports match: an exact match must name an existing
  /// file; an inexact (legacy "/" key) match gets the file and directory
  /// loaders.
  pub(crate) fn resolve_esm_match(
    &self,
    matched: EsmMatch,
    scope: &Arc<PackageConfig>,
  ) -> Result<Resolution, ResolverError> {
    let resolved = match matched.resolved {
      Some(resolved) => resolved,
      None => {
        return Err(ResolverError::ModuleNotFound {
          request: scope.path.display().to_string(),
          from: self.from.clone(),
        })
      }
    };

    let path = match resolved {
      TargetResolution::Path(path) => path,
      TargetResolution::Package(request) => {
        // A bare imports target re-enters package resolution from the
        // owning package's manifest.
        let _guard = self.enter(&request)?;
        match self.package_resolve(&request, &scope.path, cjs_conditions(), &[])? {
          Resolution::Path(path) => path,
          builtin => return Ok(builtin),
        }
      }
    };

    if matched.exact {
      if self.resolver.cache.is_file(&path) {
        return Ok(Resolution::Path(path));
      }
    } else {
      if let Some(found) = self.load_as_file(&path) {
        return Ok(Resolution::Path(found));
      }
      if let Some(found) = self.load_as_directory(&path)? {
        return Ok(Resolution::Path(found));
      }
    }

    Err(ResolverError::ModuleNotFound {
      request: path.display().to_string(),
      from: self.from.clone(),
    })
  }
}

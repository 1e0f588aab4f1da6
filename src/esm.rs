use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::builtins::is_builtin;
use crate::error::ResolverError;
use crate::package_json::{ExportsCondition, ExportsField, TargetResolution};
use crate::path::{normalize_path, resolve_path};
use crate::specifier::{is_url_like, parse_package_name, PackageName};
use crate::trace_step;
use crate::{ResolveRequest, Resolution};

/// Percent-encoded path separators are a specifier-smuggling vector.
fn has_encoded_separator(specifier: &str) -> bool {
  let lower = specifier.to_ascii_lowercase();
  lower.contains("%2f") || lower.contains("%5c")
}

impl<'a> ResolveRequest<'a> {
  /// import(specifier) from the referrer. Returns a fully resolved,
  /// existence-checked, canonical path, or a builtin.
  pub(crate) fn esm_resolve(&self, specifier: &str) -> Result<Resolution, ResolverError> {
    trace_step!(self, specifier, from = %self.from.display(), "esm_resolve");

    if specifier.is_empty() {
      return Err(ResolverError::InvalidModuleSpecifier {
        request: specifier.to_owned(),
        reason: "is an empty specifier".to_owned(),
        from: Some(self.from.clone()),
      });
    }

    if has_encoded_separator(specifier) {
      return Err(ResolverError::InvalidModuleSpecifier {
        request: specifier.to_owned(),
        reason: "must not include encoded '/' or '\\' characters".to_owned(),
        from: Some(self.from.clone()),
      });
    }

    let mut path: PathBuf;
    if is_url_like(specifier) {
      let url = Url::parse(specifier).map_err(|_| ResolverError::InvalidModuleSpecifier {
        request: specifier.to_owned(),
        reason: "is not a valid URL".to_owned(),
        from: Some(self.from.clone()),
      })?;
      match url.scheme() {
        // Builtin-module URLs bypass all filesystem checks.
        "node" => return Ok(Resolution::Builtin(specifier.to_owned())),
        "file" => {
          path = url
            .to_file_path()
            .map_err(|_| ResolverError::InvalidModuleSpecifier {
              request: specifier.to_owned(),
              reason: "is not a valid file URL".to_owned(),
              from: Some(self.from.clone()),
            })?;
        }
        scheme => {
          return Err(ResolverError::InvalidModuleSpecifier {
            request: specifier.to_owned(),
            reason: format!("has an unsupported scheme '{}'", scheme),
            from: Some(self.from.clone()),
          })
        }
      }
    } else if specifier.starts_with('/')
      || specifier.starts_with("./")
      || specifier.starts_with("../")
    {
      let decoded = percent_decode_str(specifier).decode_utf8_lossy();
      path = resolve_path(&self.from, Path::new(decoded.as_ref()));
    } else if specifier.starts_with('#') {
      match self.package_imports_resolve(specifier, self.conditions, self.custom_conditions)? {
        Resolution::Path(resolved) => path = resolved,
        builtin => return Ok(builtin),
      }
    } else {
      // Bare specifier.
      match self.package_resolve(specifier, &self.from, self.conditions, self.custom_conditions)?
      {
        Resolution::Path(resolved) => path = resolved,
        builtin => return Ok(builtin),
      }
    }

    let cache = &self.resolver.cache;
    if cache.is_dir(&path) {
      return Err(ResolverError::UnsupportedDirImport {
        path,
        from: self.from.clone(),
      });
    }

    // A compiled-output specifier may name a typed source that hasn't been
    // built yet.
    if !cache.is_file(&path) {
      if let Some(candidate) = self.typed_source_substitute(&path) {
        path = candidate;
      }
    }

    if !cache.is_file(&path) {
      return Err(ResolverError::ModuleNotFound {
        request: path.display().to_string(),
        from: self.from.clone(),
      });
    }

    Ok(Resolution::Path(cache.canonicalize(&path)))
  }

  fn typed_source_substitute(&self, path: &Path) -> Option<PathBuf> {
    let path_str = path.to_str()?;
    let (stem, replacements): (&str, &[&str]) = if let Some(s) = path_str.strip_suffix(".js") {
      (s, &[".ts", ".tsx"])
    } else if let Some(s) = path_str.strip_suffix(".jsx") {
      (s, &[".tsx"])
    } else if let Some(s) = path_str.strip_suffix(".mjs") {
      (s, &[".mts"])
    } else if let Some(s) = path_str.strip_suffix(".cjs") {
      (s, &[".cts"])
    } else {
      return None;
    };

    for ext in replacements {
      let candidate = PathBuf::from(format!("{}{}", stem, ext));
      if self.resolver.cache.is_file(&candidate) {
        return Some(candidate);
      }
    }
    None
  }

  /// Resolve a "#"-prefixed specifier through the referrer's package scope.
  pub(crate) fn package_imports_resolve(
    &self,
    specifier: &str,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<Resolution, ResolverError> {
    let _guard = self.enter(specifier)?;
    trace_step!(self, specifier, "package_imports_resolve");

    if specifier == "#" || specifier.starts_with("#/") {
      return Err(ResolverError::InvalidModuleSpecifier {
        request: specifier.to_owned(),
        reason: "cannot be '#' or start with '#/'".to_owned(),
        from: Some(self.from.clone()),
      });
    }

    let scope = self.scope()?;
    if scope.exists && scope.package.imports.is_some() {
      let matched = scope
        .package
        .resolve_package_imports(specifier, conditions, custom_conditions)
        .map_err(|err| ResolverError::from_package_json(err, &scope.path, &self.from))?;
      match matched.resolved {
        Some(TargetResolution::Path(path)) => return Ok(Resolution::Path(path)),
        Some(TargetResolution::Package(request)) => {
          let scope_path = scope.path.clone();
          return self.package_resolve(&request, &scope_path, conditions, custom_conditions);
        }
        None => {}
      }
    }

    Err(ResolverError::PackageImportNotDefined {
      specifier: specifier.to_owned(),
      package_path: scope.exists.then(|| scope.path.clone()),
      from: self.from.clone(),
    })
  }

  /// Resolve a bare specifier: self-reference first, then builtins, then the
  /// ancestor node_modules walk. The first manifest found decides; an exports
  /// map is authoritative with no legacy fallback.
  pub(crate) fn package_resolve(
    &self,
    specifier: &str,
    parent: &Path,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<Resolution, ResolverError> {
    let _guard = self.enter(specifier)?;
    trace_step!(self, specifier, parent = %parent.display(), "package_resolve");

    let package_name = parse_package_name(specifier)
      .map_err(|err| ResolverError::from_specifier(err, specifier, parent))?;

    if let Some(resolution) =
      self.package_self_resolve(&package_name, parent, conditions, custom_conditions)?
    {
      return Ok(resolution);
    }

    if package_name.subpath == "." && is_builtin(package_name.name) {
      return Ok(Resolution::Builtin(format!("node:{}", specifier)));
    }

    let parent_dir = parent.parent().unwrap_or_else(|| Path::new("/"));
    for dir in parent_dir.ancestors() {
      if dir.file_name().map_or(false, |name| name == "node_modules") {
        continue;
      }
      let package_dir = dir.join("node_modules").join(package_name.name);
      if !self.resolver.cache.is_dir(&package_dir) {
        continue;
      }

      let config = self.read_package(&package_dir.join("package.json"))?;
      if config.package.has_exports() {
        let matched = config
          .package
          .resolve_package_exports(&package_name.subpath, conditions, custom_conditions)
          .map_err(|err| ResolverError::from_package_json(err, &config.path, &self.from))?;
        return match matched.resolved {
          Some(TargetResolution::Path(path)) => Ok(Resolution::Path(path)),
          _ => Err(ResolverError::PackagePathNotExported {
            package_path: config.path.clone(),
            subpath: package_name.subpath.clone(),
            from: self.from.clone(),
          }),
        };
      }

      if package_name.subpath == "." {
        // Legacy directory load is the only fallback for packages without a
        // modern exports map.
        if let Ok(Some(path)) = self.load_as_directory(&package_dir) {
          return Ok(Resolution::Path(path));
        }
        return Err(ResolverError::ModuleNotFound {
          request: specifier.to_owned(),
          from: self.from.clone(),
        });
      }

      // Any other subpath is a literal path under the package directory.
      return Ok(Resolution::Path(normalize_path(
        &package_dir.join(&package_name.subpath[2..]),
      )));
    }

    Err(ResolverError::ModuleNotFound {
      request: specifier.to_owned(),
      from: self.from.clone(),
    })
  }

  /// Self-reference: the enclosing package can import its own declared name,
  /// bypassing the node_modules search. Requires both a declared name and a
  /// declared exports map.
  fn package_self_resolve(
    &self,
    package_name: &PackageName<'_>,
    parent: &Path,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<Option<Resolution>, ResolverError> {
    let scope = self.find_package_config(parent.parent().unwrap_or(parent))?;
    if !scope.exists {
      return Ok(None);
    }
    let package = &scope.package;
    if matches!(package.exports, ExportsField::None | ExportsField::Null) {
      return Ok(None);
    }
    if package.name.as_deref() != Some(package_name.name) {
      return Ok(None);
    }

    trace_step!(self, name = package_name.name, "package_self_resolve");
    let matched = package
      .resolve_package_exports(&package_name.subpath, conditions, custom_conditions)
      .map_err(|err| ResolverError::from_package_json(err, &scope.path, &self.from))?;
    match matched.resolved {
      Some(TargetResolution::Path(path)) => Ok(Some(Resolution::Path(path))),
      _ => Err(ResolverError::PackagePathNotExported {
        package_path: scope.path.clone(),
        subpath: package_name.subpath.clone(),
        from: self.from.clone(),
      }),
    }
  }
}

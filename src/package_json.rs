use std::path::{Path, PathBuf};

use bitflags::bitflags;
use indexmap::IndexMap;
use serde_json::Value;

use crate::path::normalize_path;
use crate::specifier::is_url_like;

bitflags! {
  /// The well-known condition tags. The open set is carried alongside as
  /// custom condition strings.
  pub struct ExportsCondition: u16 {
    const IMPORT = 1 << 0;
    const REQUIRE = 1 << 1;
    const MODULE = 1 << 2;
    const NODE = 1 << 3;
    const BROWSER = 1 << 4;
    const DEVELOPMENT = 1 << 5;
    const PRODUCTION = 1 << 6;
    const TYPES = 1 << 7;
    const DEFAULT = 1 << 8;
    /// Tooling-defined tag marking a preference for original sources over
    /// compiled output.
    const SOURCE = 1 << 9;
  }
}

impl TryFrom<&str> for ExportsCondition {
  type Error = ();
  fn try_from(value: &str) -> Result<Self, Self::Error> {
    Ok(match value {
      "import" => ExportsCondition::IMPORT,
      "require" => ExportsCondition::REQUIRE,
      "module" => ExportsCondition::MODULE,
      "node" => ExportsCondition::NODE,
      "browser" => ExportsCondition::BROWSER,
      "development" => ExportsCondition::DEVELOPMENT,
      "production" => ExportsCondition::PRODUCTION,
      "types" => ExportsCondition::TYPES,
      "default" => ExportsCondition::DEFAULT,
      "source" => ExportsCondition::SOURCE,
      _ => return Err(()),
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ModuleType {
  Module,
  CommonJs,
  None,
}

/// An exports/imports map value: a relative template string, an explicit
/// null, ordered fallbacks, or a condition-keyed object. `None` means the
/// field is absent entirely; anything else the manifest declared.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportsField {
  None,
  Null,
  String(String),
  Array(Vec<ExportsField>),
  Map(IndexMap<String, ExportsField>),
  Invalid(String),
}

impl ExportsField {
  pub fn from_value(value: &Value) -> ExportsField {
    match value {
      Value::Null => ExportsField::Null,
      Value::String(s) => ExportsField::String(s.clone()),
      Value::Array(items) => {
        ExportsField::Array(items.iter().map(ExportsField::from_value).collect())
      }
      Value::Object(map) => ExportsField::Map(
        map
          .iter()
          .map(|(k, v)| (k.clone(), ExportsField::from_value(v)))
          .collect(),
      ),
      other => ExportsField::Invalid(other.to_string()),
    }
  }
}

impl Default for ExportsField {
  fn default() -> Self {
    ExportsField::None
  }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind")]
pub enum PackageJsonError {
  InvalidPackageTarget {
    key: String,
    target: String,
    is_imports: bool,
  },
  PackagePathNotExported {
    subpath: String,
  },
  ImportNotDefined {
    specifier: String,
  },
  InvalidSpecifier {
    request: String,
    reason: String,
  },
  InvalidPackageConfig {
    message: String,
  },
}

/// What a target resolved to: a path inside the package, or a bare specifier
/// (imports maps only) the caller must resolve through the package algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetResolution {
  Path(PathBuf),
  Package(String),
}

/// An intermediate subpath-match result. `exact: false` (legacy "/" map keys)
/// means the caller must still probe the result for a file or directory.
#[derive(Debug, Clone, PartialEq)]
pub struct EsmMatch {
  pub resolved: Option<TargetResolution>,
  pub exact: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageJson {
  /// Path of the package.json file itself.
  pub path: PathBuf,
  pub name: Option<String>,
  pub main: Option<String>,
  pub module_type: ModuleType,
  pub exports: ExportsField,
  pub imports: Option<IndexMap<String, ExportsField>>,
  /// The manifest value after the host's package filter ran.
  pub raw: Value,
}

/// Immutable snapshot of the nearest ancestor manifest lookup. A missing
/// manifest is a valid, cacheable result.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageConfig {
  pub package: PackageJson,
  pub path: PathBuf,
  pub exists: bool,
}

impl PackageConfig {
  pub fn missing(path: PathBuf) -> PackageConfig {
    PackageConfig {
      package: PackageJson::empty(path.clone()),
      path,
      exists: false,
    }
  }
}

impl PackageJson {
  pub fn empty(path: PathBuf) -> PackageJson {
    PackageJson {
      path,
      name: None,
      main: None,
      module_type: ModuleType::None,
      exports: ExportsField::None,
      imports: None,
      raw: Value::Null,
    }
  }

  /// Extract the resolution-relevant fields from a raw manifest value.
  /// Unknown and ill-typed fields degrade to absent, matching the loader's
  /// lenient reading; a non-object root is a configuration error.
  pub fn from_value(path: PathBuf, raw: Value) -> Result<PackageJson, PackageJsonError> {
    let obj = raw
      .as_object()
      .ok_or_else(|| PackageJsonError::InvalidPackageConfig {
        message: "package config must be a JSON object".to_owned(),
      })?;
    let name = obj.get("name").and_then(Value::as_str).map(str::to_owned);
    let main = obj.get("main").and_then(Value::as_str).map(str::to_owned);
    let module_type = match obj.get("type").and_then(Value::as_str) {
      Some("module") => ModuleType::Module,
      Some("commonjs") => ModuleType::CommonJs,
      _ => ModuleType::None,
    };
    let exports = match obj.get("exports") {
      Some(v) => ExportsField::from_value(v),
      None => ExportsField::None,
    };
    let imports = match obj.get("imports") {
      Some(Value::Object(map)) => Some(
        map
          .iter()
          .map(|(k, v)| (k.clone(), ExportsField::from_value(v)))
          .collect(),
      ),
      _ => None,
    };
    Ok(PackageJson {
      path,
      name,
      main,
      module_type,
      exports,
      imports,
      raw,
    })
  }

  /// Directory containing the manifest.
  pub fn package_dir(&self) -> &Path {
    self.path.parent().unwrap_or_else(|| Path::new("/"))
  }

  pub fn has_exports(&self) -> bool {
    !matches!(self.exports, ExportsField::None)
  }

  /// Resolve a package subpath (in "." form) through the exports field.
  pub fn resolve_package_exports(
    &self,
    package_subpath: &str,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<EsmMatch, PackageJsonError> {
    if let ExportsField::Map(map) = &self.exports {
      let has_relative = map.keys().any(|k| k.is_empty() || k.starts_with('.'));
      let has_conditional = map.keys().any(|k| !k.is_empty() && !k.starts_with('.'));
      if has_relative && has_conditional {
        return Err(PackageJsonError::InvalidPackageConfig {
          message:
            "exports cannot contain both keys starting with '.' and keys not starting with '.'"
              .to_owned(),
        });
      }
    }

    // A bare target (string, array, null, or a conditional-only object) is an
    // exports map with the implicit key ".".
    let wrapped;
    let map = match &self.exports {
      ExportsField::Map(map) if map.keys().any(|k| k.is_empty() || k.starts_with('.')) => map,
      ExportsField::None => {
        return Err(PackageJsonError::PackagePathNotExported {
          subpath: package_subpath.to_owned(),
        })
      }
      other => {
        wrapped = std::iter::once((".".to_owned(), other.clone())).collect();
        &wrapped
      }
    };

    let resolved = self.resolve_package_imports_exports(
      package_subpath,
      map,
      false,
      conditions,
      custom_conditions,
    )?;
    if resolved.resolved.is_some() {
      return Ok(resolved);
    }
    Err(PackageJsonError::PackagePathNotExported {
      subpath: package_subpath.to_owned(),
    })
  }

  /// Resolve a "#"-prefixed specifier through the imports field.
  pub fn resolve_package_imports(
    &self,
    specifier: &str,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<EsmMatch, PackageJsonError> {
    if specifier == "#" || specifier.starts_with("#/") {
      return Err(PackageJsonError::InvalidSpecifier {
        request: specifier.to_owned(),
        reason: "cannot be '#' or start with '#/'".to_owned(),
      });
    }

    if let Some(imports) = &self.imports {
      let resolved = self.resolve_package_imports_exports(
        specifier,
        imports,
        true,
        conditions,
        custom_conditions,
      )?;
      if resolved.resolved.is_some() {
        return Ok(resolved);
      }
    }

    Err(PackageJsonError::ImportNotDefined {
      specifier: specifier.to_owned(),
    })
  }

  fn resolve_package_imports_exports(
    &self,
    match_key: &str,
    match_obj: &IndexMap<String, ExportsField>,
    is_imports: bool,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<EsmMatch, PackageJsonError> {
    // An exact, non-wildcard key wins outright.
    if !match_key.ends_with('*') {
      if let Some(target) = match_obj.get(match_key) {
        let resolved = self.resolve_package_target(
          target,
          "",
          match_key,
          false,
          is_imports,
          conditions,
          custom_conditions,
        )?;
        return Ok(EsmMatch {
          resolved,
          exact: true,
        });
      }
    }

    // Expansion keys end in "*" (wildcard substitution) or "/" (legacy prefix
    // passthrough), most specific (longest) first.
    let mut expansion_keys: Vec<&String> = match_obj
      .keys()
      .filter(|k| k.ends_with('*') || k.ends_with('/'))
      .collect();
    expansion_keys.sort_by(|a, b| b.len().cmp(&a.len()));

    for key in expansion_keys {
      if key.ends_with('*')
        && match_key.starts_with(&key[..key.len() - 1])
        && match_key.len() >= key.len()
      {
        // The remainder replaces every "*" in the target; it must be non-empty.
        let subpath = &match_key[key.len() - 1..];
        let resolved = self.resolve_package_target(
          &match_obj[key.as_str()],
          subpath,
          key,
          true,
          is_imports,
          conditions,
          custom_conditions,
        )?;
        return Ok(EsmMatch {
          resolved,
          exact: true,
        });
      } else if key.ends_with('/') && match_key.starts_with(key.as_str()) {
        let subpath = &match_key[key.len()..];
        let resolved = self.resolve_package_target(
          &match_obj[key.as_str()],
          subpath,
          key,
          false,
          is_imports,
          conditions,
          custom_conditions,
        )?;
        return Ok(EsmMatch {
          resolved,
          exact: false,
        });
      }
    }

    Ok(EsmMatch {
      resolved: None,
      exact: true,
    })
  }

  #[allow(clippy::too_many_arguments)]
  fn resolve_package_target(
    &self,
    target: &ExportsField,
    subpath: &str,
    key: &str,
    pattern: bool,
    is_imports: bool,
    conditions: ExportsCondition,
    custom_conditions: &[String],
  ) -> Result<Option<TargetResolution>, PackageJsonError> {
    match target {
      ExportsField::String(target) => {
        if !pattern && !subpath.is_empty() && !target.ends_with('/') {
          return Err(invalid_target(key, target, is_imports));
        }

        if !target.starts_with("./") {
          if is_imports
            && !target.starts_with("../")
            && !target.starts_with('/')
            && !is_url_like(target)
          {
            // A bare imports target; the caller re-enters the package
            // resolution algorithm with it.
            let request = if pattern {
              target.replace('*', subpath)
            } else {
              format!("{}{}", target, subpath)
            };
            return Ok(Some(TargetResolution::Package(request)));
          }
          return Err(invalid_target(key, target, is_imports));
        }

        let rel = &target[2..];
        if has_invalid_segments(rel) {
          return Err(invalid_target(key, target, is_imports));
        }

        let package_dir = self.package_dir();
        let resolved_target = normalize_path(&package_dir.join(rel));
        if !resolved_target.starts_with(package_dir) {
          return Err(invalid_target(key, target, is_imports));
        }

        if subpath.is_empty() {
          return Ok(Some(TargetResolution::Path(resolved_target)));
        }

        if has_invalid_segments(subpath) {
          return Err(PackageJsonError::InvalidSpecifier {
            request: format!("{}{}", key, subpath),
            reason: format!(
              "request is not a valid subpath for the \"{}\" resolution",
              if is_imports { "imports" } else { "exports" }
            ),
          });
        }

        let resolved = if pattern {
          normalize_path(&package_dir.join(rel.replace('*', subpath)))
        } else {
          // The target ends with "/" here; the remainder is a literal suffix.
          normalize_path(&resolved_target.join(subpath))
        };
        Ok(Some(TargetResolution::Path(resolved)))
      }
      ExportsField::Map(target) => {
        for condition in target.keys() {
          if is_array_index(condition) {
            return Err(PackageJsonError::InvalidPackageConfig {
              message: "\"exports\" cannot contain numeric property keys".to_owned(),
            });
          }
        }

        // Condition keys are consulted in declaration order; "default" is
        // always eligible. The first defined result wins.
        for (condition, value) in target {
          if condition == "default"
            || condition_matches(condition, conditions, custom_conditions)
          {
            match self.resolve_package_target(
              value,
              subpath,
              key,
              pattern,
              is_imports,
              conditions,
              custom_conditions,
            )? {
              None => continue,
              resolved => return Ok(resolved),
            }
          }
        }
        Ok(None)
      }
      ExportsField::Array(target) => {
        if target.is_empty() {
          return Ok(None);
        }

        // Ordered fallbacks: invalid candidates are swallowed, but the last
        // failure propagates when nothing resolves.
        let mut last_error = None;
        for item in target {
          match self.resolve_package_target(
            item,
            subpath,
            key,
            pattern,
            is_imports,
            conditions,
            custom_conditions,
          ) {
            Err(err) => {
              last_error = Some(err);
              continue;
            }
            Ok(None) => continue,
            resolved => return resolved,
          }
        }
        match last_error {
          Some(err) => Err(err),
          None => Ok(None),
        }
      }
      ExportsField::Null | ExportsField::None => Ok(None),
      ExportsField::Invalid(repr) => Err(invalid_target(key, repr, is_imports)),
    }
  }
}

fn invalid_target(key: &str, target: &str, is_imports: bool) -> PackageJsonError {
  PackageJsonError::InvalidPackageTarget {
    key: key.to_owned(),
    target: target.to_owned(),
    is_imports,
  }
}

/// Reject ".", ".." and "node_modules" path segments in targets and subpaths.
fn has_invalid_segments(s: &str) -> bool {
  s.split(|c| c == '/' || c == '\\')
    .any(|segment| matches!(segment, "." | ".." | "node_modules"))
}

fn is_array_index(key: &str) -> bool {
  key
    .parse::<u64>()
    .map_or(false, |n| n.to_string() == key && n < 0xFFFF_FFFF)
}

fn condition_matches(
  condition: &str,
  conditions: ExportsCondition,
  custom_conditions: &[String],
) -> bool {
  match ExportsCondition::try_from(condition) {
    Ok(flag) => conditions.contains(flag),
    Err(()) => custom_conditions.iter().any(|c| c == condition),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn package(manifest: Value) -> PackageJson {
    PackageJson::from_value(PathBuf::from("/foo/package.json"), manifest).unwrap()
  }

  fn resolve(pkg: &PackageJson, subpath: &str, conditions: ExportsCondition) -> EsmMatch {
    pkg.resolve_package_exports(subpath, conditions, &[]).unwrap()
  }

  fn resolved_path(m: &EsmMatch) -> PathBuf {
    match m.resolved.as_ref().unwrap() {
      TargetResolution::Path(p) => p.clone(),
      other => panic!("expected path, got {:?}", other),
    }
  }

  #[test]
  fn exports_string() {
    let pkg = package(json!({ "name": "foobar", "exports": "./exports.js" }));
    let m = resolve(&pkg, ".", ExportsCondition::empty());
    assert!(m.exact);
    assert_eq!(resolved_path(&m), PathBuf::from("/foo/exports.js"));
  }

  #[test]
  fn exports_dot() {
    let pkg = package(json!({ "name": "foobar", "exports": { ".": "./exports.js" } }));
    assert_eq!(
      resolved_path(&resolve(&pkg, ".", ExportsCondition::empty())),
      PathBuf::from("/foo/exports.js")
    );
  }

  #[test]
  fn exports_dot_conditions() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { ".": { "import": "./import.js", "require": "./require.js" } }
    }));
    assert_eq!(
      resolved_path(&resolve(
        &pkg,
        ".",
        ExportsCondition::IMPORT | ExportsCondition::REQUIRE
      )),
      PathBuf::from("/foo/import.js")
    );
    assert_eq!(
      resolved_path(&resolve(&pkg, ".", ExportsCondition::REQUIRE)),
      PathBuf::from("/foo/require.js")
    );
  }

  #[test]
  fn exports_map_conditions() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { "./foo": { "import": "./import.js", "require": "./require.js" } }
    }));
    assert_eq!(
      resolved_path(&resolve(
        &pkg,
        "./foo",
        ExportsCondition::IMPORT | ExportsCondition::REQUIRE
      )),
      PathBuf::from("/foo/import.js")
    );
    assert_eq!(
      resolved_path(&resolve(&pkg, "./foo", ExportsCondition::REQUIRE)),
      PathBuf::from("/foo/require.js")
    );
  }

  #[test]
  fn conditional_default_fallback() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { "import": "./esm.js", "require": "./cjs.js", "default": "./other.js" }
    }));
    assert_eq!(
      resolved_path(&resolve(&pkg, ".", ExportsCondition::REQUIRE)),
      PathBuf::from("/foo/cjs.js")
    );
    // No condition matches; "default" is always eligible.
    assert_eq!(
      resolved_path(&resolve(&pkg, ".", ExportsCondition::BROWSER)),
      PathBuf::from("/foo/other.js")
    );
  }

  #[test]
  fn nested_conditions() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": {
        "node": { "import": "./import.js", "require": "./require.js" },
        "default": "./default.js"
      }
    }));
    assert_eq!(
      resolved_path(&resolve(
        &pkg,
        ".",
        ExportsCondition::NODE | ExportsCondition::IMPORT
      )),
      PathBuf::from("/foo/import.js")
    );
    assert_eq!(
      resolved_path(&resolve(&pkg, ".", ExportsCondition::IMPORT)),
      PathBuf::from("/foo/default.js")
    );
  }

  #[test]
  fn subpath_patterns() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": {
        "./*": "./cheese/*.mjs",
        "./pizza/*": "./pizza/*.mjs"
      }
    }));
    assert_eq!(
      resolved_path(&resolve(&pkg, "./hello", ExportsCondition::empty())),
      PathBuf::from("/foo/cheese/hello.mjs")
    );
    assert_eq!(
      resolved_path(&resolve(&pkg, "./hello/world", ExportsCondition::empty())),
      PathBuf::from("/foo/cheese/hello/world.mjs")
    );
    assert_eq!(
      resolved_path(&resolve(&pkg, "./pizza/test", ExportsCondition::empty())),
      PathBuf::from("/foo/pizza/test.mjs")
    );
  }

  #[test]
  fn longest_pattern_wins() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": {
        "./utils/*": "./a/*.js",
        "./utils/helpers/*": "./b/*.js"
      }
    }));
    assert_eq!(
      resolved_path(&resolve(&pkg, "./utils/helpers/foo", ExportsCondition::empty())),
      PathBuf::from("/foo/b/foo.js")
    );
    assert_eq!(
      resolved_path(&resolve(&pkg, "./utils/other", ExportsCondition::empty())),
      PathBuf::from("/foo/a/other.js")
    );
  }

  #[test]
  fn pattern_requires_remainder() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { "./features/*": "./src/features/*.js" }
    }));
    assert!(matches!(
      pkg.resolve_package_exports("./features/", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::PackagePathNotExported { .. })
    ));
  }

  #[test]
  fn slash_keys_are_inexact() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { "./lib/": "./dist/" }
    }));
    let m = resolve(&pkg, "./lib/util", ExportsCondition::empty());
    assert!(!m.exact);
    assert_eq!(resolved_path(&m), PathBuf::from("/foo/dist/util"));
  }

  #[test]
  fn exports_null_subpath() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": {
        "./features/*.js": "./src/features/*.js",
        "./features/private-internal/*": null
      }
    }));
    assert_eq!(
      resolved_path(&resolve(&pkg, "./features/foo.js", ExportsCondition::empty())),
      PathBuf::from("/foo/src/features/foo.js")
    );
    assert!(matches!(
      pkg.resolve_package_exports(
        "./features/private-internal/foo.js",
        ExportsCondition::empty(),
        &[]
      ),
      Err(PackageJsonError::PackagePathNotExported { .. })
    ));
  }

  #[test]
  fn exports_invalid_targets() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": {
        "./invalid": "../invalid",
        "./absolute": "/absolute",
        "./package": "package",
        "./traversal": "./a/../../b.js"
      }
    }));
    for subpath in ["./invalid", "./absolute", "./package", "./traversal"] {
      assert!(matches!(
        pkg.resolve_package_exports(subpath, ExportsCondition::empty(), &[]),
        Err(PackageJsonError::InvalidPackageTarget { .. })
      ));
    }
  }

  #[test]
  fn subpath_traversal_rejected() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { "./lib/": "./lib/" }
    }));
    assert!(matches!(
      pkg.resolve_package_exports("./lib/../escape.js", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::InvalidSpecifier { .. })
    ));
  }

  #[test]
  fn mixed_keys_rejected() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { ".": "./a.js", "node": "./b.js" }
    }));
    assert!(matches!(
      pkg.resolve_package_exports(".", ExportsCondition::NODE, &[]),
      Err(PackageJsonError::InvalidPackageConfig { .. })
    ));
  }

  #[test]
  fn numeric_keys_rejected() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { ".": { "0": "./a.js" } }
    }));
    assert!(matches!(
      pkg.resolve_package_exports(".", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::InvalidPackageConfig { .. })
    ));
  }

  #[test]
  fn array_fallback_swallows_invalid() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { ".": ["not-relative", "./ok.js"] }
    }));
    assert_eq!(
      resolved_path(&resolve(&pkg, ".", ExportsCondition::empty())),
      PathBuf::from("/foo/ok.js")
    );
  }

  #[test]
  fn array_all_failed_propagates_last() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { ".": ["not-relative", "../escape.js"] }
    }));
    assert!(matches!(
      pkg.resolve_package_exports(".", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::InvalidPackageTarget { target, .. }) if target == "../escape.js"
    ));
  }

  #[test]
  fn imports() {
    let pkg = package(json!({
      "name": "foobar",
      "imports": {
        "#foo": "./foo.mjs",
        "#internal/*": "./src/internal/*.mjs",
        "#bar": "bar"
      }
    }));
    let m = pkg
      .resolve_package_imports("#foo", ExportsCondition::empty(), &[])
      .unwrap();
    assert_eq!(resolved_path(&m), PathBuf::from("/foo/foo.mjs"));

    let m = pkg
      .resolve_package_imports("#internal/foo", ExportsCondition::empty(), &[])
      .unwrap();
    assert_eq!(resolved_path(&m), PathBuf::from("/foo/src/internal/foo.mjs"));

    let m = pkg
      .resolve_package_imports("#bar", ExportsCondition::empty(), &[])
      .unwrap();
    assert_eq!(
      m.resolved,
      Some(TargetResolution::Package("bar".to_owned()))
    );
  }

  #[test]
  fn imports_invalid_specifiers() {
    let pkg = package(json!({ "name": "foobar", "imports": { "#a": "./a.js" } }));
    assert!(matches!(
      pkg.resolve_package_imports("#", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::InvalidSpecifier { .. })
    ));
    assert!(matches!(
      pkg.resolve_package_imports("#/x", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::InvalidSpecifier { .. })
    ));
    assert!(matches!(
      pkg.resolve_package_imports("#missing", ExportsCondition::empty(), &[]),
      Err(PackageJsonError::ImportNotDefined { .. })
    ));
  }

  #[test]
  fn imports_reject_absolute_and_url_targets() {
    let pkg = package(json!({
      "name": "foobar",
      "imports": {
        "#abs": "/etc/passwd",
        "#up": "../outside.js",
        "#url": "https://example.com/x.js"
      }
    }));
    for specifier in ["#abs", "#up", "#url"] {
      assert!(matches!(
        pkg.resolve_package_imports(specifier, ExportsCondition::empty(), &[]),
        Err(PackageJsonError::InvalidPackageTarget { .. })
      ));
    }
  }

  #[test]
  fn custom_conditions() {
    let pkg = package(json!({
      "name": "foobar",
      "exports": { ".": { "custom-tag": "./custom.js", "default": "./default.js" } }
    }));
    let m = pkg
      .resolve_package_exports(".", ExportsCondition::empty(), &["custom-tag".to_owned()])
      .unwrap();
    assert_eq!(resolved_path(&m), PathBuf::from("/foo/custom.js"));
  }
}

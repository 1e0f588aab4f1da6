//! A Node.js-compatible module resolution engine for monorepo build and test
//! tooling. Implements the require-style and import-style algorithms over a
//! shared conditional exports/imports evaluator, with an extension that
//! redirects resolved compiled output back to its original sources.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::unsync::OnceCell;

pub use cache::{Cache, CacheCow};
pub use error::ResolverError;
pub use fs::{FileSystem, OsFileSystem, PathKind};
pub use package_json::{
  EsmMatch, ExportsCondition, ExportsField, ModuleType, PackageConfig, PackageJson,
  PackageJsonError, TargetResolution,
};
pub use specifier::{parse_package_name, PackageName, SpecifierError};
pub use tsconfig::TsConfig;

mod builtins;
mod cache;
mod cjs;
mod error;
mod esm;
mod fs;
mod package_json;
mod path;
mod redirect;
mod specifier;
mod tsconfig;

/// Ceiling on exports/imports indirections. The algorithm itself defines no
/// bound for self-referential maps; exceeding this fails with a
/// resolution-cycle error instead of overflowing the stack.
pub(crate) const MAX_RESOLUTION_DEPTH: u32 = 64;

/// Hook rewriting a raw manifest value before it is cached.
pub type PackageFilter = dyn Fn(serde_json::Value, &Path) -> serde_json::Value + Send + Sync;

/// The host's own resolver, consulted when the custom algorithm fails. The
/// custom resolver is an optimization layer, never a hard dependency.
pub type FallbackResolver =
  dyn Fn(&str, &Path) -> Result<Resolution, ResolverError> + Send + Sync;

#[derive(Clone)]
pub struct ResolverOptions {
  /// Base directory for resolution when no referrer file is known.
  pub basedir: PathBuf,
  /// The referring file; preferred over `basedir` when present.
  pub filename: Option<PathBuf>,
  pub conditions: ExportsCondition,
  pub custom_conditions: Vec<String>,
  /// Extensions tried for extensionless requires, in priority order.
  pub extensions: Vec<String>,
  pub package_filter: Option<Arc<PackageFilter>>,
  /// Constrains source redirection to build configs under this root.
  pub root_dir: Option<PathBuf>,
  pub fallback: Option<Arc<FallbackResolver>>,
  /// Raise per-step diagnostics from `trace!` to `debug!` level.
  pub trace: bool,
}

impl ResolverOptions {
  pub fn new(basedir: impl Into<PathBuf>) -> Self {
    ResolverOptions {
      basedir: basedir.into(),
      filename: None,
      conditions: ExportsCondition::NODE | ExportsCondition::REQUIRE,
      custom_conditions: Vec::new(),
      extensions: vec![".js".to_owned()],
      package_filter: None,
      root_dir: None,
      fallback: None,
      trace: false,
    }
  }
}

#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Resolution {
  /// Resolved to an absolute, canonical file path.
  Path(PathBuf),
  /// Resolved to a runtime builtin module.
  Builtin(String),
}

pub struct Resolver<'a> {
  pub options: ResolverOptions,
  pub cache: CacheCow<'a>,
}

impl<'a> Resolver<'a> {
  /// Require-style resolver with the default `{node, require}` conditions.
  pub fn commonjs(basedir: impl Into<PathBuf>, cache: CacheCow<'a>) -> Self {
    Resolver {
      options: ResolverOptions::new(basedir),
      cache,
    }
  }

  /// Import-style resolver with the default `{node, import}` conditions.
  pub fn esm(basedir: impl Into<PathBuf>, cache: CacheCow<'a>) -> Self {
    let mut options = ResolverOptions::new(basedir);
    options.conditions = ExportsCondition::NODE | ExportsCondition::IMPORT;
    Resolver { options, cache }
  }

  /// Resolve a request to an absolute path or builtin. Chooses the
  /// import-style algorithm when the conditions carry the `import` tag,
  /// require-style otherwise; internal failures delegate to the configured
  /// fallback resolver.
  pub fn resolve(&self, request: &str) -> Result<Resolution, ResolverError> {
    self.resolve_with_conditions(request, self.options.conditions)
  }

  /// Thin variant pre-injecting the source-preference condition, so tooling
  /// can run against original sources without a prior compile step.
  pub fn resolve_preferring_source(&self, request: &str) -> Result<Resolution, ResolverError> {
    self.resolve_with_conditions(request, self.options.conditions | ExportsCondition::SOURCE)
  }

  fn resolve_with_conditions(
    &self,
    request: &str,
    conditions: ExportsCondition,
  ) -> Result<Resolution, ResolverError> {
    match self.resolve_inner(request, conditions) {
      Ok(resolution) => Ok(resolution),
      Err(err) => {
        if let Some(fallback) = &self.options.fallback {
          tracing::trace!(%request, %err, "delegating to fallback resolver");
          return fallback(request, &self.options.basedir);
        }
        Err(err)
      }
    }
  }

  fn resolve_inner(
    &self,
    request: &str,
    conditions: ExportsCondition,
  ) -> Result<Resolution, ResolverError> {
    let from = match &self.options.filename {
      Some(filename) if filename.is_absolute() => filename.clone(),
      Some(filename) => path::normalize_path(&self.options.basedir.join(filename)),
      // Synthetic referrer directly under basedir.
      None => self.options.basedir.join("dummy.js"),
    };

    let request_state = ResolveRequest {
      resolver: self,
      conditions,
      custom_conditions: &self.options.custom_conditions,
      from,
      scope: OnceCell::new(),
      depth: Cell::new(0),
    };

    let resolution = if conditions.contains(ExportsCondition::IMPORT) {
      request_state.esm_resolve(request)
    } else {
      request_state.commonjs_resolve(request)
    }?;

    if conditions.contains(ExportsCondition::SOURCE)
      || self.options.custom_conditions.iter().any(|c| c == "source")
    {
      if let Resolution::Path(path) = &resolution {
        if let Some(source) = redirect::redirect_to_source(&request_state, path) {
          return Ok(Resolution::Path(self.cache.canonicalize(&source)));
        }
      }
    }

    Ok(resolution)
  }
}

/// Per-request state threaded through both algorithms.
pub(crate) struct ResolveRequest<'a> {
  pub(crate) resolver: &'a Resolver<'a>,
  pub(crate) conditions: ExportsCondition,
  pub(crate) custom_conditions: &'a [String],
  /// The referring file.
  pub(crate) from: PathBuf,
  scope: OnceCell<Arc<PackageConfig>>,
  depth: Cell<u32>,
}

impl<'a> ResolveRequest<'a> {
  pub(crate) fn read_package(
    &self,
    manifest_path: &Path,
  ) -> Result<Arc<PackageConfig>, ResolverError> {
    self
      .resolver
      .cache
      .read_package(manifest_path, self.resolver.options.package_filter.as_ref())
  }

  /// Walk ancestor directories for the nearest package manifest, stopping at
  /// a node_modules boundary or the filesystem root.
  pub(crate) fn find_package_config(
    &self,
    from_dir: &Path,
  ) -> Result<Arc<PackageConfig>, ResolverError> {
    for dir in from_dir.ancestors() {
      if dir.file_name().map_or(false, |name| name == "node_modules") {
        break;
      }
      let config = self.read_package(&dir.join("package.json"))?;
      if config.exists {
        return Ok(config);
      }
    }
    Ok(Arc::new(PackageConfig::missing(
      from_dir.join("package.json"),
    )))
  }

  /// The package scope enclosing the referrer, located once per request.
  pub(crate) fn scope(&self) -> Result<&Arc<PackageConfig>, ResolverError> {
    self.scope.get_or_try_init(|| {
      self.find_package_config(self.from.parent().unwrap_or(&self.from))
    })
  }

  /// Guard mutual recursion through exports/imports indirections.
  pub(crate) fn enter(&self, request: &str) -> Result<DepthGuard<'_>, ResolverError> {
    let depth = self.depth.get() + 1;
    if depth > MAX_RESOLUTION_DEPTH {
      return Err(ResolverError::ResolutionCycle {
        request: request.to_owned(),
        from: self.from.clone(),
      });
    }
    self.depth.set(depth);
    Ok(DepthGuard(&self.depth))
  }
}

pub(crate) struct DepthGuard<'a>(&'a Cell<u32>);

impl Drop for DepthGuard<'_> {
  fn drop(&mut self) {
    self.0.set(self.0.get() - 1);
  }
}

macro_rules! trace_step {
  ($req:expr, $($arg:tt)*) => {
    if $req.resolver.options.trace {
      tracing::debug!(target: "monorepo_resolver", $($arg)*);
    } else {
      tracing::trace!(target: "monorepo_resolver", $($arg)*);
    }
  };
}
pub(crate) use trace_step;

use std::path::{Path, PathBuf};

use crate::trace_step;
use crate::ResolveRequest;

/// Map a resolved compiled-output path back to its original source file, so
/// tooling can run against sources without a prior compile step. Every
/// precondition miss keeps the compiled path; this never turns a successful
/// resolution into a failure.
pub(crate) fn redirect_to_source(request: &ResolveRequest, resolved: &Path) -> Option<PathBuf> {
  let resolved_dir = resolved.parent()?;
  let scope = request.find_package_config(resolved_dir).ok()?;
  if !scope.exists {
    return None;
  }
  let package_dir = scope.package.package_dir();

  let tsconfig_path = find_tsconfig(request, resolved_dir)?;

  // The config must belong to the package itself, not a vendored dependency
  // inside it.
  let rel = tsconfig_path.strip_prefix(package_dir).ok()?;
  if rel.components().any(|c| c.as_os_str() == "node_modules") {
    return None;
  }
  if let Some(root) = &request.resolver.options.root_dir {
    if !tsconfig_path.starts_with(root) {
      return None;
    }
  }

  let config = request.resolver.cache.read_tsconfig(&tsconfig_path).ok()?;

  // Without a declared output directory there is no convention to invert.
  config.out_dir.as_ref()?;
  let source_root = match &config.root_dir {
    Some(dir) => dir.clone(),
    None if config.is_composite() => tsconfig_path.parent()?.to_owned(),
    None => return None,
  };

  for out_dir in config.output_dirs() {
    let rel = match resolved.strip_prefix(out_dir) {
      Ok(rel) => rel,
      Err(_) => continue,
    };
    let base = source_root.join(rel);
    for candidate in source_candidates(&base) {
      if request.resolver.cache.is_file(&candidate) {
        trace_step!(
          request,
          compiled = %resolved.display(),
          source = %candidate.display(),
          "redirect_to_source"
        );
        return Some(candidate);
      }
    }
  }

  None
}

/// Nearest build-config file, walked independently of package boundaries.
fn find_tsconfig(request: &ResolveRequest, from_dir: &Path) -> Option<PathBuf> {
  for dir in from_dir.ancestors() {
    let candidate = dir.join("tsconfig.json");
    if request.resolver.cache.is_file(&candidate) {
      return Some(candidate);
    }
  }
  None
}

/// Plausible original-source names for a compiled output file, grouped by
/// module flavor and tried in priority order.
fn source_candidates(path: &Path) -> Vec<PathBuf> {
  let path_str = match path.to_str() {
    Some(s) => s,
    None => return Vec::new(),
  };

  let (stem, exts): (&str, &[&str]) = if let Some(s) = path_str.strip_suffix(".d.ts") {
    (s, &[".ts", ".tsx"])
  } else if let Some(s) = path_str.strip_suffix(".d.mts") {
    (s, &[".mts"])
  } else if let Some(s) = path_str.strip_suffix(".d.cts") {
    (s, &[".cts"])
  } else if let Some(s) = path_str.strip_suffix(".jsx") {
    (s, &[".tsx", ".jsx"])
  } else if let Some(s) = path_str.strip_suffix(".mjs") {
    (s, &[".mts", ".mjs"])
  } else if let Some(s) = path_str.strip_suffix(".cjs") {
    (s, &[".cts", ".cjs"])
  } else if let Some(s) = path_str.strip_suffix(".js") {
    (s, &[".ts", ".tsx", ".js"])
  } else {
    return Vec::new();
  };

  exts
    .iter()
    .map(|ext| PathBuf::from(format!("{}{}", stem, ext)))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn candidates_by_flavor() {
    let list = |p: &str| {
      source_candidates(Path::new(p))
        .iter()
        .map(|p| p.to_str().unwrap().to_owned())
        .collect::<Vec<_>>()
    };

    assert_eq!(list("/src/a.js"), ["/src/a.ts", "/src/a.tsx", "/src/a.js"]);
    assert_eq!(list("/src/a.mjs"), ["/src/a.mts", "/src/a.mjs"]);
    assert_eq!(list("/src/a.cjs"), ["/src/a.cts", "/src/a.cjs"]);
    assert_eq!(list("/src/a.d.ts"), ["/src/a.ts", "/src/a.tsx"]);
    assert_eq!(list("/src/a.d.mts"), ["/src/a.mts"]);
    assert!(list("/src/a.css").is_empty());
  }
}

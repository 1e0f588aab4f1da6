use std::path::{Component, Path, PathBuf};

/// Normalize path components to resolve ".." and "." segments lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut components = path.components().peekable();
  let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
    components.next();
    PathBuf::from(c.as_os_str())
  } else {
    PathBuf::new()
  };

  for component in components {
    match component {
      Component::Prefix(..) => unreachable!(),
      Component::RootDir => {
        ret.push(component.as_os_str());
      }
      Component::CurDir => {}
      Component::ParentDir => {
        ret.pop();
      }
      Component::Normal(c) => {
        ret.push(c);
      }
    }
  }

  ret
}

/// Resolve `subpath` against the file at `base`, i.e. against `base`'s directory.
/// Absolute subpaths are returned as-is (normalized).
pub fn resolve_path<A: AsRef<Path>, B: AsRef<Path>>(base: A, subpath: B) -> PathBuf {
  let subpath = subpath.as_ref();
  let mut components = subpath.components().peekable();
  if subpath.is_absolute() || matches!(components.peek(), Some(Component::Prefix(..))) {
    return normalize_path(subpath);
  }

  let mut ret = base.as_ref().to_path_buf();
  ret.pop();
  for component in subpath.components() {
    match component {
      Component::Prefix(..) | Component::RootDir => unreachable!(),
      Component::CurDir => {}
      Component::ParentDir => {
        ret.pop();
      }
      Component::Normal(c) => {
        ret.push(c);
      }
    }
  }

  ret
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize() {
    assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    assert_eq!(normalize_path(Path::new("/a//b")), PathBuf::from("/a/b"));
    assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
  }

  #[test]
  fn resolve_against_file() {
    assert_eq!(
      resolve_path("/a/b/foo.js", "./bar.js"),
      PathBuf::from("/a/b/bar.js")
    );
    assert_eq!(
      resolve_path("/a/b/foo.js", "../bar.js"),
      PathBuf::from("/a/bar.js")
    );
    assert_eq!(resolve_path("/a/b/foo.js", "/abs.js"), PathBuf::from("/abs.js"));
  }
}

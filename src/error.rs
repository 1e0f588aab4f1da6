use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::package_json::PackageJsonError;
use crate::specifier::SpecifierError;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum ResolverError {
  ModuleNotFound {
    request: String,
    from: PathBuf,
  },
  InvalidModuleSpecifier {
    request: String,
    reason: String,
    from: Option<PathBuf>,
  },
  PackagePathNotExported {
    /// Path of the offending package.json.
    package_path: PathBuf,
    /// The unmatched subpath, in "." form.
    subpath: String,
    from: PathBuf,
  },
  PackageImportNotDefined {
    specifier: String,
    package_path: Option<PathBuf>,
    from: PathBuf,
  },
  InvalidPackageTarget {
    package_path: PathBuf,
    key: String,
    target: String,
    is_imports: bool,
    from: PathBuf,
  },
  InvalidPackageConfig {
    path: PathBuf,
    message: String,
    from: Option<PathBuf>,
  },
  UnsupportedDirImport {
    path: PathBuf,
    from: PathBuf,
  },
  ResolutionCycle {
    request: String,
    from: PathBuf,
  },
  IOError(IOError),
}

impl ResolverError {
  /// The stable error code consumed by hosts.
  pub fn code(&self) -> &'static str {
    match self {
      ResolverError::ModuleNotFound { .. } => "MODULE_NOT_FOUND",
      ResolverError::InvalidModuleSpecifier { .. } => "INVALID_MODULE_SPECIFIER",
      ResolverError::PackagePathNotExported { .. } => "PACKAGE_PATH_NOT_EXPORTED",
      ResolverError::PackageImportNotDefined { .. } => "PACKAGE_IMPORT_NOT_DEFINED",
      ResolverError::InvalidPackageTarget { .. } => "INVALID_PACKAGE_TARGET",
      ResolverError::InvalidPackageConfig { .. } => "INVALID_PACKAGE_CONFIG",
      ResolverError::UnsupportedDirImport { .. } => "UNSUPPORTED_DIR_IMPORT",
      ResolverError::ResolutionCycle { .. } => "RESOLUTION_CYCLE",
      ResolverError::IOError(..) => "EIO",
    }
  }

  /// Attach manifest and referrer context to an evaluator error.
  pub(crate) fn from_package_json(
    error: PackageJsonError,
    package_path: &Path,
    from: &Path,
  ) -> ResolverError {
    match error {
      PackageJsonError::PackagePathNotExported { subpath } => {
        ResolverError::PackagePathNotExported {
          package_path: package_path.to_owned(),
          subpath,
          from: from.to_owned(),
        }
      }
      PackageJsonError::ImportNotDefined { specifier } => {
        ResolverError::PackageImportNotDefined {
          specifier,
          package_path: Some(package_path.to_owned()),
          from: from.to_owned(),
        }
      }
      PackageJsonError::InvalidPackageTarget {
        key,
        target,
        is_imports,
      } => ResolverError::InvalidPackageTarget {
        package_path: package_path.to_owned(),
        key,
        target,
        is_imports,
        from: from.to_owned(),
      },
      PackageJsonError::InvalidSpecifier { request, reason } => {
        ResolverError::InvalidModuleSpecifier {
          request,
          reason,
          from: Some(from.to_owned()),
        }
      }
      PackageJsonError::InvalidPackageConfig { message } => {
        ResolverError::InvalidPackageConfig {
          path: package_path.to_owned(),
          message,
          from: Some(from.to_owned()),
        }
      }
    }
  }

  pub(crate) fn from_specifier(
    error: SpecifierError,
    request: &str,
    from: &Path,
  ) -> ResolverError {
    let reason = match error {
      SpecifierError::EmptySpecifier => "is an empty specifier".to_owned(),
      SpecifierError::InvalidPackageSpecifier(..) => "is not a valid package name".to_owned(),
    };
    ResolverError::InvalidModuleSpecifier {
      request: request.to_owned(),
      reason,
      from: Some(from.to_owned()),
    }
  }
}

fn with_referrer(f: &mut fmt::Formatter<'_>, from: &Path) -> fmt::Result {
  write!(f, " imported from '{}'", from.display())
}

impl fmt::Display for ResolverError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResolverError::ModuleNotFound { request, from } => {
        write!(f, "Cannot find module '{}'", request)?;
        with_referrer(f, from)
      }
      ResolverError::InvalidModuleSpecifier {
        request,
        reason,
        from,
      } => {
        write!(f, "Invalid module '{}' {}", request, reason)?;
        if let Some(from) = from {
          with_referrer(f, from)?;
        }
        Ok(())
      }
      ResolverError::PackagePathNotExported {
        package_path,
        subpath,
        from,
      } => {
        if subpath.as_str() == "." {
          write!(
            f,
            "No \"exports\" main defined in package config '{}'",
            package_path.display()
          )?;
        } else {
          write!(
            f,
            "Package subpath '{}' is not defined by \"exports\" in package config '{}'",
            subpath,
            package_path.display()
          )?;
        }
        with_referrer(f, from)
      }
      ResolverError::PackageImportNotDefined {
        specifier,
        package_path,
        from,
      } => {
        write!(f, "Package import specifier \"{}\" is not defined", specifier)?;
        if let Some(package_path) = package_path {
          write!(f, " in package config '{}'", package_path.display())?;
        }
        with_referrer(f, from)
      }
      ResolverError::InvalidPackageTarget {
        package_path,
        key,
        target,
        is_imports,
        from,
      } => {
        let field = if *is_imports { "imports" } else { "exports" };
        if key.as_str() == "." && !*is_imports {
          write!(
            f,
            "Invalid \"exports\" main target {:?} defined in package config '{}'",
            target,
            package_path.display()
          )?;
        } else {
          write!(
            f,
            "Invalid \"{}\" target {:?} defined for '{}' in package config '{}'",
            field,
            target,
            key,
            package_path.display()
          )?;
        }
        with_referrer(f, from)?;
        if !*is_imports && !target.is_empty() && !target.starts_with("./") {
          write!(f, "; targets must start with './'")?;
        }
        Ok(())
      }
      ResolverError::InvalidPackageConfig { path, message, from } => {
        write!(f, "Invalid package config '{}'", path.display())?;
        if let Some(from) = from {
          with_referrer(f, from)?;
        }
        if !message.is_empty() {
          write!(f, "; {}", message)?;
        }
        Ok(())
      }
      ResolverError::UnsupportedDirImport { path, from } => {
        write!(
          f,
          "Directory import '{}' is not supported when resolving ES modules from '{}'",
          path.display(),
          from.display()
        )
      }
      ResolverError::ResolutionCycle { request, from } => {
        write!(f, "Cycle detected while resolving '{}'", request)?;
        with_referrer(f, from)
      }
      ResolverError::IOError(err) => write!(f, "{}", err.0),
    }
  }
}

impl std::error::Error for ResolverError {}

#[derive(Debug, Clone)]
pub struct IOError(Arc<std::io::Error>);

impl serde::Serialize for IOError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    #[derive(serde::Serialize)]
    struct IOErrorMessage {
      message: String,
    }

    let msg = IOErrorMessage {
      message: self.0.to_string(),
    };

    msg.serialize(serializer)
  }
}

impl PartialEq for IOError {
  fn eq(&self, other: &Self) -> bool {
    self.0.kind() == other.0.kind()
  }
}

impl From<std::io::Error> for ResolverError {
  fn from(e: std::io::Error) -> Self {
    ResolverError::IOError(IOError(Arc::new(e)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes() {
    let err = ResolverError::ModuleNotFound {
      request: "missing".into(),
      from: PathBuf::from("/app/index.js"),
    };
    assert_eq!(err.code(), "MODULE_NOT_FOUND");
    assert_eq!(
      err.to_string(),
      "Cannot find module 'missing' imported from '/app/index.js'"
    );
  }

  #[test]
  fn not_exported_messages() {
    let main = ResolverError::PackagePathNotExported {
      package_path: PathBuf::from("/app/node_modules/pkg/package.json"),
      subpath: ".".into(),
      from: PathBuf::from("/app/index.js"),
    };
    assert!(main.to_string().starts_with("No \"exports\" main defined"));

    let sub = ResolverError::PackagePathNotExported {
      package_path: PathBuf::from("/app/node_modules/pkg/package.json"),
      subpath: "./other".into(),
      from: PathBuf::from("/app/index.js"),
    };
    assert!(sub
      .to_string()
      .contains("Package subpath './other' is not defined by \"exports\""));
  }

  #[test]
  fn relative_target_hint() {
    let err = ResolverError::InvalidPackageTarget {
      package_path: PathBuf::from("/pkg/package.json"),
      key: "./x".into(),
      target: "lib/x.js".into(),
      is_imports: false,
      from: PathBuf::from("/app/index.js"),
    };
    assert!(err.to_string().ends_with("targets must start with './'"));
  }
}

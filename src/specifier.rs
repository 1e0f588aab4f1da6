use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum SpecifierError {
  EmptySpecifier,
  InvalidPackageSpecifier(String),
}

/// A bare specifier split into its package name and subpath. The subpath is
/// always in "." form: "." for the package root, "./x/y" otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageName<'a> {
  pub name: &'a str,
  pub subpath: String,
  pub is_scoped: bool,
}

/// Split a bare specifier into name and subpath. Unscoped names end at the
/// first "/", scoped ("@scope/name") names at the second.
pub fn parse_package_name(specifier: &str) -> Result<PackageName<'_>, SpecifierError> {
  if specifier.is_empty() {
    return Err(SpecifierError::EmptySpecifier);
  }

  let name = if let Some(rest) = specifier.strip_prefix('@') {
    let scope_len = rest
      .find('/')
      .ok_or_else(|| SpecifierError::InvalidPackageSpecifier(specifier.to_owned()))?;
    if scope_len == 0 {
      return Err(SpecifierError::InvalidPackageSpecifier(specifier.to_owned()));
    }
    let after_scope = &rest[scope_len + 1..];
    let name_len = after_scope.find('/').unwrap_or(after_scope.len());
    if name_len == 0 {
      return Err(SpecifierError::InvalidPackageSpecifier(specifier.to_owned()));
    }
    &specifier[..1 + scope_len + 1 + name_len]
  } else {
    let name_len = specifier.find('/').unwrap_or(specifier.len());
    &specifier[..name_len]
  };

  if name.is_empty()
    || name.starts_with('.')
    || name.contains('\\')
    || name.contains('%')
  {
    return Err(SpecifierError::InvalidPackageSpecifier(specifier.to_owned()));
  }

  Ok(PackageName {
    name,
    subpath: format!(".{}", &specifier[name.len()..]),
    is_scoped: name.starts_with('@'),
  })
}

/// Parse a URL scheme per https://url.spec.whatwg.org/#scheme-state. Returns
/// the scheme (lowercased) and the remainder after the ":".
pub fn parse_scheme(input: &str) -> Result<(Cow<'_, str>, &str), ()> {
  if input.is_empty() || !input.starts_with(|c: char| c.is_ascii_alphabetic()) {
    return Err(());
  }
  let mut is_lowercase = true;
  for (i, c) in input.chars().enumerate() {
    match c {
      'A'..='Z' => {
        is_lowercase = false;
      }
      'a'..='z' | '0'..='9' | '+' | '-' | '.' => {}
      ':' => {
        let scheme = &input[0..i];
        let rest = &input[i + 1..];
        return Ok(if is_lowercase {
          (Cow::Borrowed(scheme), rest)
        } else {
          (Cow::Owned(scheme.to_ascii_lowercase()), rest)
        });
      }
      _ => {
        return Err(());
      }
    }
  }

  // EOF before ':'
  Err(())
}

/// Whether the string has the shape of a URL with a scheme.
pub fn is_url_like(specifier: &str) -> bool {
  parse_scheme(specifier).is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unscoped() {
    let parsed = parse_package_name("lodash").unwrap();
    assert_eq!(parsed.name, "lodash");
    assert_eq!(parsed.subpath, ".");
    assert!(!parsed.is_scoped);

    let parsed = parse_package_name("lodash/clone/deep").unwrap();
    assert_eq!(parsed.name, "lodash");
    assert_eq!(parsed.subpath, "./clone/deep");
  }

  #[test]
  fn scoped() {
    let parsed = parse_package_name("@scope/pkg").unwrap();
    assert_eq!(parsed.name, "@scope/pkg");
    assert_eq!(parsed.subpath, ".");
    assert!(parsed.is_scoped);

    let parsed = parse_package_name("@scope/pkg/sub/path").unwrap();
    assert_eq!(parsed.name, "@scope/pkg");
    assert_eq!(parsed.subpath, "./sub/path");
  }

  #[test]
  fn invalid() {
    assert_eq!(parse_package_name(""), Err(SpecifierError::EmptySpecifier));
    assert!(parse_package_name("@scope").is_err());
    assert!(parse_package_name("@/name").is_err());
    assert!(parse_package_name("@scope//x").is_err());
    assert!(parse_package_name(".hidden").is_err());
    assert!(parse_package_name("./relative").is_err());
    assert!(parse_package_name("na%6de").is_err());
    assert!(parse_package_name("na\\me").is_err());
  }

  #[test]
  fn schemes() {
    assert!(is_url_like("node:fs"));
    assert!(is_url_like("file:///x/y"));
    assert!(is_url_like("https://example.com"));
    assert!(!is_url_like("./relative"));
    assert!(!is_url_like("pkg/subpath"));
    assert!(!is_url_like("#internal"));
  }
}

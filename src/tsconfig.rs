use std::path::{Path, PathBuf};

use json_comments::StripComments;

use crate::path::normalize_path;

/// The output/source directory geometry of a build config. Directories are
/// stored absolute, resolved against the directory of the file that declared
/// them (which makes inherited values from `extends` chains correct).
#[derive(Debug, Clone, PartialEq)]
pub struct TsConfig {
  pub path: PathBuf,
  pub extends: Option<String>,
  pub root_dir: Option<PathBuf>,
  pub out_dir: Option<PathBuf>,
  pub declaration_dir: Option<PathBuf>,
  /// Alternate output directory for the CommonJS flavor of a dual build.
  pub cjs_out_dir: Option<PathBuf>,
  /// Alternate output directory for the ESM flavor of a dual build.
  pub esm_out_dir: Option<PathBuf>,
  pub composite: Option<bool>,
}

#[derive(serde::Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawTsConfig {
  extends: Option<String>,
  compiler_options: RawCompilerOptions,
}

#[derive(serde::Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawCompilerOptions {
  root_dir: Option<String>,
  out_dir: Option<String>,
  declaration_dir: Option<String>,
  cjs_out_dir: Option<String>,
  esm_out_dir: Option<String>,
  composite: Option<bool>,
}

impl TsConfig {
  /// Parse a build-config file. Comments are allowed, unknown fields ignored.
  pub fn parse(path: PathBuf, data: &str) -> serde_json::Result<TsConfig> {
    let raw: RawTsConfig = serde_json::from_reader(StripComments::new(data.as_bytes()))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("/")).to_owned();
    let absolute = |dir: &Path, value: &Option<String>| {
      value.as_ref().map(|v| normalize_path(&dir.join(v)))
    };

    Ok(TsConfig {
      extends: raw.extends,
      root_dir: absolute(&dir, &raw.compiler_options.root_dir),
      out_dir: absolute(&dir, &raw.compiler_options.out_dir),
      declaration_dir: absolute(&dir, &raw.compiler_options.declaration_dir),
      cjs_out_dir: absolute(&dir, &raw.compiler_options.cjs_out_dir),
      esm_out_dir: absolute(&dir, &raw.compiler_options.esm_out_dir),
      composite: raw.compiler_options.composite,
      path,
    })
  }

  pub fn is_composite(&self) -> bool {
    self.composite.unwrap_or(false)
  }

  /// Inherit fields from a base config that this one leaves unset. Values in
  /// the base were already resolved against the base's own directory.
  pub fn merge_missing(&mut self, base: &TsConfig) {
    if self.root_dir.is_none() {
      self.root_dir = base.root_dir.clone();
    }
    if self.out_dir.is_none() {
      self.out_dir = base.out_dir.clone();
    }
    if self.declaration_dir.is_none() {
      self.declaration_dir = base.declaration_dir.clone();
    }
    if self.cjs_out_dir.is_none() {
      self.cjs_out_dir = base.cjs_out_dir.clone();
    }
    if self.esm_out_dir.is_none() {
      self.esm_out_dir = base.esm_out_dir.clone();
    }
    if self.composite.is_none() {
      self.composite = base.composite;
    }
  }

  /// Declared output directories in priority order.
  pub fn output_dirs(&self) -> impl Iterator<Item = &PathBuf> {
    self
      .out_dir
      .iter()
      .chain(self.declaration_dir.iter())
      .chain(self.cjs_out_dir.iter())
      .chain(self.esm_out_dir.iter())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_with_comments() {
    let config = TsConfig::parse(
      PathBuf::from("/proj/pkg/tsconfig.json"),
      r#"{
        // build layout
        "compilerOptions": {
          "rootDir": "src",
          "outDir": "dist",
          "composite": true, /* project references */
          "cjsOutDir": "dist/cjs",
          "esmOutDir": "dist/esm"
        }
      }"#,
    )
    .unwrap();

    assert_eq!(config.root_dir, Some(PathBuf::from("/proj/pkg/src")));
    assert_eq!(config.out_dir, Some(PathBuf::from("/proj/pkg/dist")));
    assert_eq!(config.cjs_out_dir, Some(PathBuf::from("/proj/pkg/dist/cjs")));
    assert_eq!(config.esm_out_dir, Some(PathBuf::from("/proj/pkg/dist/esm")));
    assert!(config.is_composite());
    assert_eq!(
      config.output_dirs().collect::<Vec<_>>(),
      vec![
        &PathBuf::from("/proj/pkg/dist"),
        &PathBuf::from("/proj/pkg/dist/cjs"),
        &PathBuf::from("/proj/pkg/dist/esm"),
      ]
    );
  }

  #[test]
  fn merge_inherits_unset_fields() {
    let base = TsConfig::parse(
      PathBuf::from("/proj/tsconfig.base.json"),
      r#"{ "compilerOptions": { "outDir": "out", "composite": true } }"#,
    )
    .unwrap();
    let mut child = TsConfig::parse(
      PathBuf::from("/proj/pkg/tsconfig.json"),
      r#"{ "extends": "../tsconfig.base.json", "compilerOptions": { "rootDir": "src" } }"#,
    )
    .unwrap();
    child.merge_missing(&base);

    assert_eq!(child.root_dir, Some(PathBuf::from("/proj/pkg/src")));
    // Inherited outDir stays relative to the file that declared it.
    assert_eq!(child.out_dir, Some(PathBuf::from("/proj/out")));
    assert!(child.is_composite());
  }

  #[test]
  fn missing_compiler_options() {
    let config =
      TsConfig::parse(PathBuf::from("/proj/tsconfig.json"), r#"{ "files": [] }"#).unwrap();
    assert_eq!(config.out_dir, None);
    assert!(!config.is_composite());
    assert_eq!(config.output_dirs().count(), 0);
  }
}

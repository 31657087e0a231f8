//! Bundler configuration.
//!
//! The same structure backs the library API, the CLI flags and the
//! optional TOML configuration file; CLI flags override file values.

use std::{fmt, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Language-version level the declarations target.
///
/// Only the ES2015 boundary matters to the bundler itself: it selects the
/// form of the trailing main-module alias block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    Es3,
    Es5,
    Es2015,
    #[default]
    Latest,
}

impl ScriptTarget {
    /// Whether `export * from` re-exports are available at this level.
    pub fn is_es2015_or_higher(self) -> bool {
        matches!(self, Self::Es2015 | Self::Latest)
    }
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Es3 => write!(f, "es3"),
            Self::Es5 => write!(f, "es5"),
            Self::Es2015 => write!(f, "es2015"),
            Self::Latest => write!(f, "latest"),
        }
    }
}

/// Module system passed through to the compiler front-end.
///
/// The built-in declaration host has no use for it, but custom hosts
/// driving a real compiler do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[value(name = "commonjs")]
    CommonJs,
    Amd,
    Umd,
    System,
    Es2015,
    #[value(name = "esnext")]
    EsNext,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommonJs => write!(f, "commonjs"),
            Self::Amd => write!(f, "amd"),
            Self::Umd => write!(f, "umd"),
            Self::System => write!(f, "system"),
            Self::Es2015 => write!(f, "es2015"),
            Self::EsNext => write!(f, "esnext"),
        }
    }
}

/// Complete configuration of one bundling run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BundleConfig {
    /// Directory all bundled files must live under; resolved to an
    /// absolute path before any membership comparison
    pub base_dir: PathBuf,
    /// Entry source files, in an order that determines output order
    pub files: Vec<PathBuf>,
    /// Path of the aggregate output file
    pub out: PathBuf,
    /// Library name used as the module-identifier prefix
    pub name: String,
    /// Path of the module aliased as the library's default surface
    pub main: Option<String>,
    /// Paths written as `/// <reference path="..." />` directives ahead
    /// of any module content
    pub externs: Vec<String>,
    /// Files to omit from the bundle, given as paths relative to
    /// `base_dir`
    pub excludes: Vec<PathBuf>,
    /// Indentation for module-block bodies; one tab when unset
    pub indent: Option<String>,
    /// Line terminator; the host default when unset
    pub eol: Option<String>,
    /// Target language level
    pub target: ScriptTarget,
    /// Module kind forwarded to the compiler front-end
    pub module: Option<ModuleKind>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::new(),
            files: Vec::new(),
            out: PathBuf::new(),
            name: String::new(),
            main: None,
            externs: Vec::new(),
            excludes: Vec::new(),
            indent: None,
            eol: None,
            target: ScriptTarget::Latest,
            module: None,
        }
    }
}

impl BundleConfig {
    /// Minimal configuration with the four required fields.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        files: Vec<PathBuf>,
        out: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            files,
            out: out.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// The effective line terminator.
    pub fn eol(&self) -> &str {
        match &self.eol {
            Some(eol) => eol,
            None if cfg!(windows) => "\r\n",
            None => "\n",
        }
    }

    /// The effective indentation string.
    pub fn indent(&self) -> &str {
        self.indent.as_deref().unwrap_or("\t")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_tab_indent_and_latest_target() {
        let config = BundleConfig::default();
        assert_eq!(config.indent(), "\t");
        assert_eq!(config.target, ScriptTarget::Latest);
        assert!(config.target.is_es2015_or_higher());
    }

    #[test]
    fn toml_round_trip() {
        let config: BundleConfig = toml::from_str(
            r#"
            base-dir = "/projects/lib/src"
            files    = ["index.ts"]
            out      = "dist/lib.d.ts"
            name     = "lib"
            main     = "index"
            target   = "es5"
            module   = "commonjs"
            excludes = ["internal.d.ts"]
            "#,
        )
        .expect("config parses");
        assert_eq!(config.name, "lib");
        assert_eq!(config.target, ScriptTarget::Es5);
        assert!(!config.target.is_es2015_or_higher());
        assert_eq!(config.module, Some(ModuleKind::CommonJs));
        assert_eq!(config.excludes, vec![PathBuf::from("internal.d.ts")]);
    }
}

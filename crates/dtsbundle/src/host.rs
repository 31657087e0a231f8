//! The compiler boundary: a per-run compilation context and the built-in
//! declaration host.
//!
//! [`Program`] is request-scoped — it lives for exactly one bundling run
//! and is always passed explicitly, never held in process-wide state. The
//! built-in [`DeclarationHost`] covers inputs whose declarations already
//! exist on disk; a caller wrapping a real compiler front-end implements
//! [`CompilerHost`] and plugs genuine declaration emission into the same
//! pipeline.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{
    config::{ModuleKind, ScriptTarget},
    diagnostics::{BundleError, Diagnostic},
    module_id::{normalize_slashes, resolve_path},
    parser,
    syntax::SourceFile,
};

/// Compiler options for one run, handed to [`CompilerHost::compile`].
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    /// Absolute, normalized base directory
    pub base_dir: &'a Path,
    /// Resolved entry files, in configured order
    pub filenames: &'a [PathBuf],
    /// Target language level
    pub target: ScriptTarget,
    /// Module system, where the front-end cares
    pub module: Option<ModuleKind>,
}

/// The compiler front-end as the bundler sees it.
pub trait CompilerHost {
    /// Build the compilation unit covering the entry files and their
    /// transitive dependencies. Fails with
    /// [`BundleError::CompilationFailed`] before any output is produced.
    fn compile(&mut self, options: &CompileOptions<'_>) -> Result<Program, BundleError>;

    /// Narrowed per-file emission: produce the declaration output for one
    /// source file, parsed. Fails with [`BundleError::EmitterError`] when
    /// the file reports diagnostics or cannot be emitted; the run
    /// processes no further files after that.
    fn emit_declaration(&mut self, file: &SourceFile) -> Result<SourceFile, BundleError>;
}

/// The compilation unit of one bundling run.
///
/// Files are kept in first-encountered order: a pre-order walk from the
/// configured entries, each file followed by its newly discovered
/// dependencies. The order is deterministic and independent of
/// filesystem iteration order.
#[derive(Debug)]
pub struct Program {
    files: IndexMap<PathBuf, SourceFile>,
}

impl Program {
    /// All discovered source files, in bundle order.
    pub fn source_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Built-in host for pre-generated declaration files.
///
/// "Emission" of a declaration source is the source itself; an
/// implementation `.ts` file cannot be emitted here, because declaration
/// generation needs a full type checker.
#[derive(Debug, Default)]
pub struct DeclarationHost;

impl DeclarationHost {
    fn visit(
        &self,
        path: &Path,
        base_dir: &Path,
        files: &mut IndexMap<PathBuf, SourceFile>,
        errors: &mut Vec<Diagnostic>,
    ) {
        if files.contains_key(path) {
            return;
        }
        let file_name = normalize_slashes(&path.to_string_lossy()).into_owned();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                errors.push(Diagnostic::file_level(file_name, format!("cannot read file: {err}")));
                return;
            }
        };
        debug!("loaded {file_name} ({} bytes)", text.len());
        let source = parser::parse(file_name, text);
        let specifiers = parser::relative_specifiers(&source.root);
        let dir = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        files.insert(path.to_path_buf(), source);
        for specifier in specifiers {
            match resolve_import(&dir, &specifier) {
                Some(target) => {
                    if target.starts_with(base_dir) {
                        self.visit(&target, base_dir, files, errors);
                    } else {
                        debug!("not bundling {} (outside base directory)", target.display());
                    }
                }
                None => warn!("unresolved relative import '{specifier}' in {}", path.display()),
            }
        }
    }
}

impl CompilerHost for DeclarationHost {
    fn compile(&mut self, options: &CompileOptions<'_>) -> Result<Program, BundleError> {
        let mut files = IndexMap::new();
        let mut errors = Vec::new();
        for filename in options.filenames {
            self.visit(filename, options.base_dir, &mut files, &mut errors);
        }
        // Every diagnostic is logged, whether or not it turns out fatal.
        for source in files.values() {
            for diagnostic in &source.diagnostics {
                info!("{diagnostic}");
            }
        }
        if !errors.is_empty() {
            for diagnostic in &errors {
                info!("{diagnostic}");
            }
            return Err(BundleError::CompilationFailed(errors));
        }
        debug!("compiled {} source files", files.len());
        Ok(Program { files })
    }

    fn emit_declaration(&mut self, file: &SourceFile) -> Result<SourceFile, BundleError> {
        if !file.diagnostics.is_empty() {
            return Err(BundleError::EmitterError {
                file: file.file_name.clone(),
                diagnostics: file.diagnostics.clone(),
            });
        }
        if file.is_declaration_file() {
            Ok(file.clone())
        } else {
            Err(BundleError::EmitterError {
                file: file.file_name.clone(),
                diagnostics: vec![Diagnostic::file_level(
                    file.file_name.clone(),
                    "declaration emission requires a compiler front-end; pre-generate a .d.ts file for this module",
                )],
            })
        }
    }
}

/// Resolve a relative import specifier against the importing file's
/// directory, probing the usual declaration candidates.
fn resolve_import(dir: &Path, specifier: &str) -> Option<PathBuf> {
    let target = resolve_path(dir, Path::new(specifier));
    let name = target.to_string_lossy();
    if name.ends_with(".d.ts") || name.ends_with(".ts") {
        return target.is_file().then_some(target);
    }
    let mut candidates = Vec::with_capacity(4);
    for suffix in [".d.ts", ".ts"] {
        let mut with_suffix = target.clone().into_os_string();
        with_suffix.push(suffix);
        candidates.push(PathBuf::from(with_suffix));
    }
    candidates.push(target.join("index.d.ts"));
    candidates.push(target.join("index.ts"));
    candidates.into_iter().find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptTarget;
    use std::fs;
    use tempfile::TempDir;

    fn compile(base: &Path, entries: &[PathBuf]) -> Result<Program, BundleError> {
        let options = CompileOptions {
            base_dir: base,
            filenames: entries,
            target: ScriptTarget::Latest,
            module: None,
        };
        DeclarationHost.compile(&options)
    }

    #[test]
    fn discovery_is_preorder_from_entries() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::write(base.join("a.d.ts"), "export * from './b';\n").unwrap();
        fs::write(base.join("b.d.ts"), "export * from './c';\n").unwrap();
        fs::write(base.join("c.d.ts"), "export declare const c: number;\n").unwrap();
        let program = compile(base, &[base.join("a.d.ts")]).unwrap();
        let names: Vec<_> = program
            .source_files()
            .map(|f| f.file_name.rsplit('/').next().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["a.d.ts", "b.d.ts", "c.d.ts"]);
    }

    #[test]
    fn duplicate_entries_are_loaded_once() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::write(base.join("a.d.ts"), "export declare const a: number;\n").unwrap();
        let program = compile(base, &[base.join("a.d.ts"), base.join("a.d.ts")]).unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn imports_outside_base_dir_are_not_bundled() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("src");
        fs::create_dir_all(&base).unwrap();
        fs::write(temp.path().join("outside.d.ts"), "export declare const o: number;\n").unwrap();
        fs::write(base.join("a.d.ts"), "export * from '../outside';\n").unwrap();
        let program = compile(&base, &[base.join("a.d.ts")]).unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn missing_entry_fails_compilation() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        let err = compile(base, &[base.join("nope.d.ts")]).unwrap_err();
        match err {
            BundleError::CompilationFailed(diagnostics) => {
                assert!(diagnostics[0].message.contains("cannot read file"));
            }
            other => panic!("expected CompilationFailed, got {other:?}"),
        }
    }

    #[test]
    fn emitting_a_broken_file_is_an_emitter_error() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::write(base.join("broken.d.ts"), "export * from './lost\n").unwrap();
        let program = compile(base, &[base.join("broken.d.ts")]).unwrap();
        let file = program.source_files().next().unwrap();
        let err = DeclarationHost.emit_declaration(file).unwrap_err();
        match err {
            BundleError::EmitterError { file, diagnostics } => {
                assert!(file.ends_with("broken.d.ts"));
                assert!(!diagnostics.is_empty());
            }
            other => panic!("expected EmitterError, got {other:?}"),
        }
    }

    #[test]
    fn implementation_sources_cannot_be_emitted() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::write(base.join("impl.ts"), "export const x = 1;\n").unwrap();
        let program = compile(base, &[base.join("impl.ts")]).unwrap();
        let file = program.source_files().next().unwrap();
        assert!(DeclarationHost.emit_declaration(file).is_err());
    }
}

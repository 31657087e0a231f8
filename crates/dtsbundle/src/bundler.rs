//! Bundle orchestration: drive the host over the resolved entry set and
//! stream the rewritten declarations into one output file.
//!
//! Files are processed strictly sequentially in the program's reported
//! order; the output stream is the only shared sink. On any failure the
//! partially written output file is removed — a rejected run's output is
//! unreliable by definition, so none is left behind.

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use rustc_hash::FxHashSet;

use crate::{
    config::BundleConfig,
    diagnostics::{BundleError, Diagnostic},
    host::{CompileOptions, CompilerHost, DeclarationHost, Program},
    module_id::{join_module_id, module_id, normalize_path, normalize_slashes, resolve_path},
    rewriter::{Rewrite, rewrite},
    syntax::{SourceFile, SyntaxKind},
};

/// Bundle the configured entry files into one declaration file.
pub fn bundle(config: &BundleConfig) -> Result<(), BundleError> {
    bundle_with_progress(config, &mut |_| {})
}

/// Like [`bundle`], with a progress callback invoked with human-readable
/// status messages. Purely observational; returns are ignored.
pub fn bundle_with_progress(config: &BundleConfig, progress: &mut dyn FnMut(&str)) -> Result<(), BundleError> {
    bundle_with_host(config, &mut DeclarationHost, progress)
}

/// Bundle through a caller-supplied compiler host.
pub fn bundle_with_host(
    config: &BundleConfig,
    host: &mut dyn CompilerHost,
    progress: &mut dyn FnMut(&str),
) -> Result<(), BundleError> {
    let base_dir = resolve_base_dir(&config.base_dir)?;
    let base_str = normalize_slashes(&base_dir.to_string_lossy()).into_owned();
    let eol = config.eol();
    let indent = config.indent();
    let filenames = resolve_filenames(&base_dir, &config.files);
    let excludes: FxHashSet<String> = config
        .excludes
        .iter()
        .map(|path| {
            let resolved = resolve_path(&base_dir, path);
            module_id(&config.name, &base_str, &normalize_slashes(&resolved.to_string_lossy()))
        })
        .collect();
    debug!("bundling {} entry files under {base_str}", filenames.len());

    let options = CompileOptions {
        base_dir: &base_dir,
        filenames: &filenames,
        target: config.target,
        module: config.module,
    };
    let program = host.compile(&options)?;

    if let Some(parent) = config.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(BundleError::WriteError)?;
        }
    }
    let file = fs::File::create(&config.out).map_err(BundleError::WriteError)?;
    let mut output = BufWriter::new(file);

    let result = write_bundle(
        config, &base_str, eol, indent, &excludes, &program, host, &mut output, progress,
    )
    .and_then(|()| output.flush().map_err(BundleError::WriteError));

    match result {
        Ok(()) => {
            info!("wrote bundle to {}", config.out.display());
            Ok(())
        }
        Err(err) => {
            drop(output);
            if let Err(remove_err) = fs::remove_file(&config.out) {
                warn!("failed to remove partial output {}: {remove_err}", config.out.display());
            }
            Err(err)
        }
    }
}

fn resolve_base_dir(base_dir: &Path) -> Result<PathBuf, BundleError> {
    if base_dir.as_os_str().is_empty() {
        return Err(BundleError::CompilationFailed(vec![Diagnostic::global(
            "base directory is required",
        )]));
    }
    match std::path::absolute(base_dir) {
        Ok(absolute) => Ok(normalize_path(&absolute)),
        Err(err) => Err(BundleError::CompilationFailed(vec![Diagnostic::global(format!(
            "cannot resolve base directory {}: {err}",
            base_dir.display()
        ))])),
    }
}

/// Resolve entry filenames: keep paths already under the base directory,
/// join everything else onto it.
fn resolve_filenames(base_dir: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|file| {
            let resolved = std::path::absolute(file).map_or_else(|_| file.clone(), |p| normalize_path(&p));
            if resolved.starts_with(base_dir) {
                resolved
            } else {
                resolve_path(base_dir, file)
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn write_bundle(
    config: &BundleConfig,
    base_str: &str,
    eol: &str,
    indent: &str,
    excludes: &FxHashSet<String>,
    program: &Program,
    host: &mut dyn CompilerHost,
    output: &mut dyn Write,
    progress: &mut dyn FnMut(&str),
) -> Result<(), BundleError> {
    for path in &config.externs {
        progress(&format!("Writing external dependency {path}"));
        write!(output, "/// <reference path=\"{path}\" />{eol}").map_err(BundleError::WriteError)?;
    }

    for file in program.source_files() {
        // Dependencies from outside the base directory never land in the
        // bundle.
        if !file.file_name.starts_with(base_str) {
            debug!("skipping {} (outside base directory)", file.file_name);
            continue;
        }
        let id = module_id(&config.name, base_str, &file.file_name);
        if excludes.contains(&id) {
            debug!("excluding {id}");
            continue;
        }
        progress(&format!("Processing {}", file.file_name));
        let declaration = host.emit_declaration(file)?;
        if declaration.external_module_indicator {
            write_module_block(output, &declaration, &id, eol, indent).map_err(BundleError::WriteError)?;
        } else {
            // Pre-built global declaration: copied verbatim, unwrapped.
            output
                .write_all(declaration.text.as_bytes())
                .map_err(BundleError::WriteError)?;
        }
    }

    if let Some(main) = &config.main {
        let main_id = main_module_id(&config.name, base_str, main);
        progress(&format!("Aliased main module {} to {main_id}", config.name));
        if config.target.is_es2015_or_higher() {
            write!(
                output,
                "declare module '{}' {{{eol}{indent}export * from '{main_id}';{eol}}}{eol}",
                config.name
            )
            .map_err(BundleError::WriteError)?;
        } else {
            write!(
                output,
                "declare module '{}' {{{eol}{indent}import main = require('{main_id}');{eol}{indent}export = main;{eol}}}{eol}",
                config.name
            )
            .map_err(BundleError::WriteError)?;
        }
    }
    Ok(())
}

/// Write one rewritten declaration wrapped in its named module block.
fn write_module_block(
    output: &mut dyn Write,
    declaration: &SourceFile,
    id: &str,
    eol: &str,
    indent: &str,
) -> io::Result<()> {
    write!(output, "declare module '{id}' {{{eol}{indent}")?;
    let content = rewrite(declaration, |node| match node.kind {
        // Content is nested inside an explicit module block now; the
        // top-level declaration markers have to go.
        SyntaxKind::DeclareKeyword => Rewrite::Replace(String::new()),
        SyntaxKind::ExternalModuleReference => match &node.specifier {
            Some(specifier) if specifier.starts_with('.') => {
                Rewrite::Replace(format!("require('{}')", join_module_id(id, specifier)))
            }
            _ => Rewrite::Keep,
        },
        SyntaxKind::StringLiteral => match &node.specifier {
            Some(specifier) if specifier.starts_with('.') => {
                Rewrite::Replace(format!("'{}'", join_module_id(id, specifier)))
            }
            _ => Rewrite::Keep,
        },
        _ => Rewrite::Keep,
    });
    output.write_all(indent_body(&content, eol, indent).as_bytes())?;
    write!(output, "{eol}}}{eol}")
}

/// Insert the indent after every line break that starts a non-blank,
/// non-final line.
fn indent_body(text: &str, eol: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut rest = text;
    while let Some(found) = rest.find(eol) {
        let after = found + eol.len();
        out.push_str(&rest[..after]);
        rest = &rest[after..];
        if !rest.is_empty() && !rest.starts_with(eol) {
            out.push_str(indent);
        }
    }
    out.push_str(rest);
    out
}

/// Identifier the main alias block points at. A value already prefixed
/// with the library name is taken as a ready-made identifier; anything
/// else is a path relative to the base directory.
fn main_module_id(name: &str, base_str: &str, main: &str) -> String {
    if main == name || main.starts_with(&format!("{name}/")) {
        return main.to_owned();
    }
    let resolved = resolve_path(Path::new(base_str), Path::new(main));
    module_id(name, base_str, &normalize_slashes(&resolved.to_string_lossy()))
}

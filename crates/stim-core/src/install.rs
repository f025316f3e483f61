//! Compiling command files and writing the result where the assistant
//! runtime looks for commands.
//!
//! The target directory is always passed in explicitly; only
//! [`InstallTarget::global`] consults the environment.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::compiler;
use crate::error::StimError;
use crate::resolver;

/// A compiled command, ready to be written as `<name>.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCommand {
    pub name: String,
    pub markdown: String,
}

/// Result of installing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub name: String,
    pub path: PathBuf,
}

/// Directory that receives compiled `<name>.md` files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    dir: PathBuf,
}

impl InstallTarget {
    /// `~/.claude/commands`.
    pub fn global() -> Result<Self, StimError> {
        let home = dirs::home_dir().ok_or(StimError::NoHomeDir)?;
        Ok(Self::dir(home.join(".claude").join("commands")))
    }

    /// `<project_dir>/.claude/commands`.
    pub fn local(project_dir: impl AsRef<Path>) -> Self {
        Self::dir(project_dir.as_ref().join(".claude").join("commands"))
    }

    pub fn dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.md", name))
    }
}

/// Rejects paths whose extension is not `expected`.
pub fn check_extension(path: &Path, expected: &str) -> Result<(), StimError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == expected => Ok(()),
        _ => Err(StimError::Extension {
            path: path.to_path_buf(),
            expected: expected.to_string(),
        }),
    }
}

/// Parses, resolves and compiles the command file at `path`.
///
/// Task files are resolved relative to the directory containing `path`.
pub fn compile_file(path: &Path) -> Result<CompiledCommand, StimError> {
    if !path.is_file() {
        return Err(StimError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }
    let command = resolver::resolve_file(path)?;
    let markdown = compiler::compile(&command);
    Ok(CompiledCommand { name: command.name, markdown })
}

/// Writes a compiled command into `target`, creating the directory if needed.
pub fn write_command(compiled: &CompiledCommand, target: &InstallTarget) -> Result<Installed, StimError> {
    std::fs::create_dir_all(target.path())?;
    let path = target.output_path(&compiled.name);
    std::fs::write(&path, &compiled.markdown)?;
    info!(name = %compiled.name, path = %path.display(), "installed command");
    Ok(Installed { name: compiled.name.clone(), path })
}

/// Compiles `path` and writes `<name>.md` into `target`.
pub fn install_file(path: &Path, target: &InstallTarget) -> Result<Installed, StimError> {
    let compiled = compile_file(path)?;
    write_command(&compiled, target)
}

//! Inlining of file-referenced tasks.
//!
//! A `task("helpers/research.stim")` statement names another command file.
//! The resolver parses that file and splices its body into the task, walking
//! the tree depth-first. Paths are relative to the directory of the file that
//! contains the reference.
//!
//! Cycle detection only considers the chain of files leading to the current
//! reference, so two sibling tasks may include the same file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use stim_core::{parser, resolver};
//!
//! let source = std::fs::read_to_string("commands/review.stim").unwrap();
//! let command = parser::parse(&source).unwrap();
//! let resolved = resolver::resolve(command, Path::new("commands")).unwrap();
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::ast::{Command, Statement, Task};
use crate::error::ResolveError;
use crate::parser;

/// Source of included command files.
pub trait SourceLoader {
    /// Returns the file's text, or `Ok(None)` if it does not exist.
    fn load(&self, path: &Path) -> io::Result<Option<String>>;
}

/// Reads included files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> io::Result<Option<String>> {
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(path).map(Some)
    }
}

/// In-memory file set, keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), source.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(self.files.get(&normalize(path)).cloned())
    }
}

/// Collapses `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub struct Resolver<L = FsLoader> {
    loader: L,
}

impl<L: SourceLoader> Resolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Expands every file task in `command`, resolving paths against
    /// `base_path`.
    pub fn resolve(&self, command: Command, base_path: &Path) -> Result<Command, ResolveError> {
        self.resolve_with_chain(command, base_path, &[])
    }

    /// Parses and resolves the file at `path`. The file itself counts as the
    /// first link of the include chain, so a file that references itself is
    /// rejected immediately.
    pub fn resolve_file(&self, path: &Path) -> Result<Command, ResolveError> {
        let path = normalize(path);
        let command = self.load_command(&path)?;
        let base = parent_dir(&path);
        self.resolve_with_chain(command, &base, &[path])
    }

    fn resolve_with_chain(
        &self,
        command: Command,
        base_path: &Path,
        chain: &[PathBuf],
    ) -> Result<Command, ResolveError> {
        let body = self.resolve_statements(command.body, base_path, chain)?;
        Ok(Command { name: command.name, body })
    }

    fn resolve_statements(
        &self,
        statements: Vec<Statement>,
        base_path: &Path,
        chain: &[PathBuf],
    ) -> Result<Vec<Statement>, ResolveError> {
        statements
            .into_iter()
            .map(|s| self.resolve_statement(s, base_path, chain))
            .collect()
    }

    fn resolve_statement(
        &self,
        statement: Statement,
        base_path: &Path,
        chain: &[PathBuf],
    ) -> Result<Statement, ResolveError> {
        Ok(match statement {
            Statement::Task(task) => Statement::Task(self.resolve_task(task, base_path, chain)?),
            Statement::Parallel { tasks } => Statement::Parallel {
                tasks: tasks
                    .into_iter()
                    .map(|t| self.resolve_task(t, base_path, chain))
                    .collect::<Result<_, _>>()?,
            },
            Statement::If { condition, body, else_body } => Statement::If {
                condition,
                body: self.resolve_statements(body, base_path, chain)?,
                else_body: else_body
                    .map(|b| self.resolve_statements(b, base_path, chain))
                    .transpose()?,
            },
            Statement::While { condition, body } => Statement::While {
                condition,
                body: self.resolve_statements(body, base_path, chain)?,
            },
            Statement::For { variable, iterable, body } => Statement::For {
                variable,
                iterable,
                body: self.resolve_statements(body, base_path, chain)?,
            },
            other => other,
        })
    }

    fn resolve_task(&self, task: Task, base_path: &Path, chain: &[PathBuf]) -> Result<Task, ResolveError> {
        let Some(file) = task.file.clone() else {
            let body = self.resolve_statements(task.body, base_path, chain)?;
            return Ok(Task { body, ..task });
        };

        let path = normalize(&base_path.join(&file));
        if chain.contains(&path) {
            let mut cycle = chain.to_vec();
            cycle.push(path);
            return Err(ResolveError::Circular { file, chain: cycle });
        }

        debug!(path = %path.display(), depth = chain.len(), "including task file");
        let included = self.load_command(&path)?;

        let mut extended = chain.to_vec();
        extended.push(path.clone());
        let body = self.resolve_statements(included.body, &parent_dir(&path), &extended)?;

        let description = if task.description.is_empty() {
            included.name
        } else {
            task.description
        };
        Ok(Task {
            description,
            agent: task.agent,
            body,
            file: Some(file),
        })
    }

    fn load_command(&self, path: &Path) -> Result<Command, ResolveError> {
        let source = self
            .loader
            .load(path)
            .map_err(|source| ResolveError::Read { path: path.to_path_buf(), source })?
            .ok_or_else(|| ResolveError::NotFound { path: path.to_path_buf() })?;
        parser::parse(&source).map_err(|source| ResolveError::Parse { path: path.to_path_buf(), source })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Resolves `command` against files on disk.
pub fn resolve(command: Command, base_path: &Path) -> Result<Command, ResolveError> {
    Resolver::new(FsLoader).resolve(command, base_path)
}

/// Parses and resolves a command file on disk.
pub fn resolve_file(path: &Path) -> Result<Command, ResolveError> {
    Resolver::new(FsLoader).resolve_file(path)
}

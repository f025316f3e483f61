//! # stim-core
//!
//! Toolchain for the stim command language: a small DSL describing an
//! interactive, agent-driven workflow, compiled into markdown instructions for
//! an AI coding assistant.
//!
//! ## Modules
//!
//! - [`ast`] - Command tree shared by every stage
//! - [`parser`] - Source text to [`ast::Command`]
//! - [`resolver`] - Inlines `task("file")` references, with cycle detection
//! - [`compiler`] - [`ast::Command`] to instruction text
//! - [`install`] - File-level pipeline and writing `<name>.md` outputs
//! - [`config`] - Persistent user settings
//!
//! ## Example
//!
//! ```
//! use stim_core::{compiler, parser};
//!
//! let command = parser::parse("command greet {\n  ask(\"What is your name?\")\n}").unwrap();
//! assert_eq!(compiler::compile(&command), "Ask the user: \"What is your name?\"");
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod install;
pub mod parser;
pub mod resolver;

pub use ast::{AgentType, Command, Statement, Task, Text, Value};
pub use error::{ParseError, ResolveError, StimError};

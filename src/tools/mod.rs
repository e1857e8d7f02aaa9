// src/tools/mod.rs

//! Collaborators the build treats as opaque `content -> content | error`
//! functions: the stylesheet compiler, the markup templater and the linter.

pub mod lint;
pub mod markup;
pub mod stylesheet;

pub use lint::{CommandLinter, Linter, PatternLinter};
pub use markup::{MarkupContext, MinijinjaTemplater, Templater};
pub use stylesheet::{GrassCompiler, StylesheetCompiler};

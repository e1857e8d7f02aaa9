// src/bundle/mod.rs

//! Bundle assembly and source maps.

pub mod assembler;
pub mod sourcemap;

pub use assembler::{BundleArtifact, BundleAssembler, ModuleSpan, SinkConfig, TransformedModule};
pub use sourcemap::{SourceMap, SourceMapFragment};

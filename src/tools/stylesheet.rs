// src/tools/stylesheet.rs

use std::fmt::Debug;
use std::io;
use std::path::Path;

use anyhow::{Result, anyhow};
use grass::{Fs, OutputStyle};

use crate::fs::FileSystem;
use crate::types::BuildVariant;

/// Compiles a stylesheet entry into CSS.
pub trait StylesheetCompiler: Send + Sync + Debug {
    fn compile(&self, fs: &dyn FileSystem, entry: &Path, variant: BuildVariant) -> Result<String>;
}

/// SCSS compiler backed by `grass`.
///
/// Production output is compressed, development output expanded. Imports are
/// read through the same [`FileSystem`] as everything else.
#[derive(Debug, Clone, Default)]
pub struct GrassCompiler;

impl StylesheetCompiler for GrassCompiler {
    fn compile(&self, fs: &dyn FileSystem, entry: &Path, variant: BuildVariant) -> Result<String> {
        let style = if variant.is_production() {
            OutputStyle::Compressed
        } else {
            OutputStyle::Expanded
        };
        let adapter = GrassFs(fs);
        let mut opts = grass::Options::default().style(style).fs(&adapter);
        if let Some(dir) = entry.parent() {
            opts = opts.load_path(dir);
        }

        grass::from_path(entry, &opts).map_err(|e| anyhow!("{e}"))
    }
}

/// Lets `grass` resolve imports through a [`FileSystem`].
#[derive(Debug)]
struct GrassFs<'a>(&'a dyn FileSystem);

impl Fs for GrassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0
            .read_to_string(path)
            .map(String::into_bytes)
            .map_err(|e| io::Error::new(io_error_kind(&e), format!("{e:#}")))
    }
}

/// Kind of the first I/O error in the chain; anything else is bad data.
fn io_error_kind(err: &anyhow::Error) -> io::ErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<io::Error>())
        .map(io::Error::kind)
        .unwrap_or(io::ErrorKind::InvalidData)
}

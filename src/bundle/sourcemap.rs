// src/bundle/sourcemap.rs

//! Minimal source map (revision 3) model.

use serde::Serialize;

/// One generated position mapped back to an original position.
/// Lines and columns are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mapping {
    pub gen_line: u32,
    pub gen_col: u32,
    pub source: u32,
    pub orig_line: u32,
    pub orig_col: u32,
}

/// Mappings for a single transformed module, relative to the module's own
/// output (line 0 is its first line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapFragment {
    pub source: String,
    pub source_content: Option<String>,
    /// `(gen_line, orig_line)` pairs, column 0 on both sides.
    pub lines: Vec<(u32, u32)>,
}

impl SourceMapFragment {
    /// Map every output line to the same line of the original source.
    ///
    /// Trailing blank lines of `output` are not mapped; the assembler drops
    /// them too.
    pub fn line_identity(source: impl Into<String>, original: &str, output: &str) -> Self {
        let original_lines = original.lines().count().max(1) as u32;
        let body = output.trim_end_matches('\n');
        let output_lines = if body.is_empty() { 0 } else { body.lines().count() as u32 };
        let lines = (0..output_lines)
            .map(|l| (l, l.min(original_lines - 1)))
            .collect();
        Self {
            source: source.into(),
            source_content: Some(original.to_string()),
            lines,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub mappings: Vec<Mapping>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMapJson<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [Option<String>],
    names: [&'a str; 0],
    mappings: String,
}

impl SourceMap {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    /// Append `fragment` with its generated lines shifted by `line_offset`.
    ///
    /// Only the first `line_count` generated lines belong to the module;
    /// mappings past them are dropped.
    pub fn push_fragment(&mut self, fragment: &SourceMapFragment, line_offset: u32, line_count: u32) {
        let source = self.sources.len() as u32;
        self.sources.push(fragment.source.clone());
        self.sources_content.push(fragment.source_content.clone());
        self.mappings.extend(
            fragment
                .lines
                .iter()
                .filter(|&&(gen_line, _)| gen_line < line_count)
                .map(|&(gen_line, orig_line)| Mapping {
                    gen_line: gen_line + line_offset,
                    gen_col: 0,
                    source,
                    orig_line,
                    orig_col: 0,
                }),
        );
    }

    /// Original `(source, line)` of the first mapping on `gen_line`.
    pub fn lookup(&self, gen_line: u32) -> Option<(&str, u32)> {
        self.mappings
            .iter()
            .find(|m| m.gen_line == gen_line)
            .and_then(|m| {
                self.sources
                    .get(m.source as usize)
                    .map(|s| (s.as_str(), m.orig_line))
            })
    }

    /// The `mappings` field: `;` between generated lines, `,` between segments.
    pub fn encode_mappings(&self) -> String {
        let mut sorted = self.mappings.clone();
        sorted.sort();

        let mut out = String::new();
        let mut line = 0u32;
        let mut prev_col = 0i64;
        let mut prev_source = 0i64;
        let mut prev_orig_line = 0i64;
        let mut prev_orig_col = 0i64;
        let mut first_in_line = true;

        for m in &sorted {
            while line < m.gen_line {
                out.push(';');
                line += 1;
                prev_col = 0;
                first_in_line = true;
            }
            if !first_in_line {
                out.push(',');
            }
            first_in_line = false;

            encode_vlq(&mut out, m.gen_col as i64 - prev_col);
            encode_vlq(&mut out, m.source as i64 - prev_source);
            encode_vlq(&mut out, m.orig_line as i64 - prev_orig_line);
            encode_vlq(&mut out, m.orig_col as i64 - prev_orig_col);

            prev_col = m.gen_col as i64;
            prev_source = m.source as i64;
            prev_orig_line = m.orig_line as i64;
            prev_orig_col = m.orig_col as i64;
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&SourceMapJson {
            version: 3,
            file: &self.file,
            sources: &self.sources,
            sources_content: &self.sources_content,
            names: [],
            mappings: self.encode_mappings(),
        })
    }
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_vlq(out: &mut String, value: i64) {
    let signed = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    let mut vlq = signed as u64;

    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

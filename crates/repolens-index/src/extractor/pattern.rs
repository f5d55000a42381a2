//! Regex strategy for languages without a bundled grammar.
//!
//! A declaration match opens a fixed window of lines. The window ignores real
//! body boundaries, so chunks can cut a long body short or spill into the next
//! declaration.

use std::sync::LazyLock;

use regex::Regex;

use super::ChunkStrategy;
use crate::chunk::{Chunk, ChunkKind};
use crate::error::Result;
use crate::languages::Lang;

static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+([a-zA-Z0-9_]+)\s*\([^)]*\)\s*\{").unwrap());
static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"const\s+([a-zA-Z0-9_]+)\s*=\s*\([^)]*\)\s*=>\s*\{").unwrap()
});
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+([a-zA-Z0-9_]+)\s*\{").unwrap());

#[derive(Debug, Clone, Copy)]
pub struct PatternStrategy {
    pub function_window: usize,
    pub class_window: usize,
}

impl Default for PatternStrategy {
    fn default() -> Self {
        Self {
            function_window: 40,
            class_window: 80,
        }
    }
}

struct SourceFile<'a> {
    source: &'a str,
    lines: Vec<&'a str>,
    path: &'a str,
    lang: Lang,
}

impl PatternStrategy {
    fn collect(&self, re: &Regex, kind: ChunkKind, file: &SourceFile<'_>, out: &mut Vec<Chunk>) {
        let window = match kind {
            ChunkKind::Class => self.class_window,
            ChunkKind::Function | ChunkKind::Commit => self.function_window,
        };
        for caps in re.captures_iter(file.source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let start_line = file.source[..whole.start()].matches('\n').count();
            let end_line = (start_line + window).min(file.lines.len());
            let text = file
                .lines
                .get(start_line..end_line)
                .unwrap_or_default()
                .join("\n");
            out.push(Chunk::code(kind, file.lang, file.path, name.as_str(), text));
        }
    }
}

impl ChunkStrategy for PatternStrategy {
    fn extract(&self, source: &str, path: &str, lang: Lang) -> Result<Vec<Chunk>> {
        let file = SourceFile {
            source,
            lines: source.lines().collect(),
            path,
            lang,
        };
        let mut chunks = Vec::new();
        for re in [&*FUNCTION_RE, &*ARROW_RE] {
            self.collect(re, ChunkKind::Function, &file, &mut chunks);
        }
        self.collect(&CLASS_RE, ChunkKind::Class, &file, &mut chunks);
        Ok(chunks)
    }
}

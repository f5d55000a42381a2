//! Structural extraction: source files to definition chunks, history to commit chunks.

mod ast;
mod commits;
mod pattern;

use std::path::Path;

pub use ast::AstStrategy;
pub use commits::{extract_commits, parse_commit_line};
pub use pattern::PatternStrategy;

use crate::chunk::{Chunk, assign_ids};
use crate::error::{IndexError, Result};
use crate::languages::{Lang, Strategy, detect_language, is_extractable};

/// Extracts chunks from one file's source.
pub trait ChunkStrategy: Send + Sync {
    /// # Errors
    ///
    /// Returns `IndexError::Parse` when the source cannot be parsed.
    fn extract(&self, source: &str, path: &str, lang: Lang) -> Result<Vec<Chunk>>;
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub function_window: usize,
    pub class_window: usize,
    pub max_file_bytes: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            function_window: 40,
            class_window: 80,
            max_file_bytes: 1_048_576,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    /// Files with a known language, parsed or not.
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    /// Files over `max_file_bytes`.
    pub files_skipped: usize,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub code: Vec<Chunk>,
    pub commits: Vec<Chunk>,
    pub stats: ExtractStats,
}

impl Extraction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.commits.is_empty()
    }

    /// Code chunks first, then commits.
    #[must_use]
    pub fn into_chunks(self) -> Vec<Chunk> {
        let mut all = self.code;
        all.extend(self.commits);
        all
    }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractorConfig,
    ast: AstStrategy,
    pattern: PatternStrategy,
}

impl Extractor {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        let pattern = PatternStrategy {
            function_window: config.function_window,
            class_window: config.class_window,
        };
        Self {
            config,
            ast: AstStrategy,
            pattern,
        }
    }

    fn strategy_for(&self, lang: Lang) -> &dyn ChunkStrategy {
        match lang.strategy() {
            Strategy::Ast => &self.ast,
            Strategy::Pattern => &self.pattern,
        }
    }

    /// Chunk one file. `rel_path` is recorded in chunk metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read as UTF-8 or fails to parse.
    pub fn extract_file(&self, abs_path: &Path, rel_path: &str) -> Result<Vec<Chunk>> {
        let lang = detect_language(abs_path)
            .ok_or_else(|| IndexError::Parse(format!("unsupported file {rel_path}")))?;
        let source = std::fs::read_to_string(abs_path)?;
        self.strategy_for(lang).extract(&source, rel_path, lang)
    }

    /// Walk `root` and chunk every supported file. Per-file failures are logged
    /// and counted; they never abort the walk.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::WorkingCopyMissing` if `root` is not a directory.
    pub fn extract_code(&self, root: &Path) -> Result<(Vec<Chunk>, ExtractStats)> {
        if !root.is_dir() {
            return Err(IndexError::WorkingCopyMissing(root.to_path_buf()));
        }

        let mut stats = ExtractStats::default();
        let mut chunks = Vec::new();

        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .sort_by_file_path(Ord::cmp)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) || !is_extractable(entry.path()) {
                continue;
            }
            stats.files_scanned += 1;

            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let too_large = entry
                .metadata()
                .is_ok_and(|m| m.len() > self.config.max_file_bytes);
            if too_large {
                tracing::debug!(file = %rel_path, "skipped, larger than max_file_bytes");
                stats.files_skipped += 1;
                continue;
            }

            match self.extract_file(entry.path(), &rel_path) {
                Ok(file_chunks) => {
                    stats.files_parsed += 1;
                    tracing::trace!(file = %rel_path, chunks = file_chunks.len());
                    chunks.extend(file_chunks);
                }
                Err(e) => {
                    stats.files_failed += 1;
                    tracing::warn!(file = %rel_path, "extraction failed: {e}");
                }
            }
        }

        Ok((chunks, stats))
    }

    /// Extract code chunks off the async runtime, then the commit log, and number both.
    ///
    /// # Errors
    ///
    /// Fails only when `root` does not exist or the blocking task panics.
    pub async fn extract(&self, root: &Path) -> Result<Extraction> {
        if !root.is_dir() {
            return Err(IndexError::WorkingCopyMissing(root.to_path_buf()));
        }

        let this = self.clone();
        let walk_root = root.to_path_buf();
        let (mut code, stats) =
            tokio::task::spawn_blocking(move || this.extract_code(&walk_root)).await??;
        let mut commits = extract_commits(root).await;

        assign_ids(&mut code, &mut commits);
        tracing::info!(
            root = %root.display(),
            files = stats.files_scanned,
            code_chunks = code.len(),
            commit_chunks = commits.len(),
            "extraction finished"
        );

        Ok(Extraction {
            code,
            commits,
            stats,
        })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::chunk::ChunkKind;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let err = Extractor::default().extract(&gone).await.unwrap_err();
        assert!(matches!(err, IndexError::WorkingCopyMissing(_)));
    }

    #[tokio::test]
    async fn empty_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let extraction = Extractor::default().extract(dir.path()).await.unwrap();
        assert!(extraction.is_empty());
        assert_eq!(extraction.stats, ExtractStats::default());
    }

    #[cfg(feature = "lang-python")]
    #[tokio::test]
    async fn mixed_tree_extracts_and_numbers_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pkg/math.py", "def add(a, b):\n    return a + b\n");
        write(dir.path(), "web/app.js", "class App {\n}\n");
        write(dir.path(), "README.md", "# readme\n");

        let extraction = Extractor::default().extract(dir.path()).await.unwrap();
        assert_eq!(extraction.stats.files_scanned, 2);
        assert_eq!(extraction.stats.files_parsed, 2);

        let code = &extraction.code;
        assert_eq!(code.len(), 2);
        assert_eq!(code[0].id, "code_0");
        assert_eq!(code[0].name(), Some("add"));
        assert_eq!(code[0].metadata()["path"], "pkg/math.py");
        assert_eq!(code[1].id, "code_1");
        assert_eq!(code[1].kind(), ChunkKind::Class);
        assert!(extraction.commits.is_empty());
    }

    #[cfg(feature = "lang-python")]
    #[tokio::test]
    async fn malformed_file_degrades_to_zero_chunks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_bad.py", "def broken(:\n");
        write(dir.path(), "b_good.py", "def ok():\n    return 1\n");

        let extraction = Extractor::default().extract(dir.path()).await.unwrap();
        assert_eq!(extraction.stats.files_failed, 1);
        assert_eq!(extraction.stats.files_parsed, 1);
        assert_eq!(extraction.code.len(), 1);
        assert_eq!(extraction.code[0].name(), Some("ok"));
    }

    #[tokio::test]
    async fn hidden_and_oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".cache/gen.js", "function hidden() {\n}\n");
        write(dir.path(), "big.js", &"function big() {\n}\n".repeat(50));
        write(dir.path(), "small.js", "function small() {\n}\n");

        let extractor = Extractor::new(ExtractorConfig {
            max_file_bytes: 100,
            ..ExtractorConfig::default()
        });
        let extraction = extractor.extract(dir.path()).await.unwrap();
        assert_eq!(extraction.stats.files_skipped, 1);
        let names: Vec<_> = extraction.code.iter().filter_map(Chunk::name).collect();
        assert_eq!(names, vec!["small"]);
    }

    #[test]
    fn non_utf8_file_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.js"), [0xff, 0xfe, 0x00]).unwrap();
        let (chunks, stats) = Extractor::default().extract_code(dir.path()).unwrap();
        assert!(chunks.is_empty());
        assert_eq!(stats.files_failed, 1);
    }

    #[test]
    fn into_chunks_orders_code_before_commits() {
        let mut code = vec![Chunk::code(
            ChunkKind::Function,
            Lang::Go,
            "m.go",
            "f",
            "func f() {}".into(),
        )];
        let mut commits = vec![Chunk::commit("s", "d", "init")];
        assign_ids(&mut code, &mut commits);
        let all = Extraction {
            code,
            commits,
            stats: ExtractStats::default(),
        }
        .into_chunks();
        assert_eq!(all[0].id, "code_0");
        assert_eq!(all[1].id, "commit_0");
    }
}

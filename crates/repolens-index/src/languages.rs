//! Extension-keyed language registry.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How chunks are located in a file of a given language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Walk a tree-sitter syntax tree.
    Ast,
    /// Regex search for declaration shapes plus a fixed line window.
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    Rust,
    Go,
    JavaScript,
    TypeScript,
}

impl Lang {
    /// Identifier stored in the `language` payload field.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    #[must_use]
    pub fn strategy(self) -> Strategy {
        match self {
            Self::Python | Self::Rust | Self::Go => Strategy::Ast,
            Self::JavaScript | Self::TypeScript => Strategy::Pattern,
        }
    }

    /// Tree-sitter grammar, `None` for pattern languages or a disabled feature.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "py" => Some(Lang::Python),
        "rs" => Some(Lang::Rust),
        "go" => Some(Lang::Go),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "tsx" => Some(Lang::TypeScript),
        _ => None,
    }
}

/// A file is extractable when its language has a usable strategy in this build.
#[must_use]
pub fn is_extractable(path: &Path) -> bool {
    detect_language(path).is_some_and(|lang| match lang.strategy() {
        Strategy::Ast => lang.grammar().is_some(),
        Strategy::Pattern => true,
    })
}

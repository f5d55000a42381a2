//! The unit of retrieval and its stored metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::languages::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Commit,
}

impl ChunkKind {
    /// Value of the `type` payload field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Commit => "commit",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "commit" => Some(Self::Commit),
            _ => None,
        }
    }

    /// Ordinal prefix of chunk ids: `code_{i}` or `commit_{i}`.
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Function | Self::Class => "code",
            Self::Commit => "commit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkMeta {
    Code {
        kind: ChunkKind,
        language: Lang,
        /// Path relative to the working copy root, `/`-separated.
        path: String,
        name: String,
    },
    Commit {
        sha: String,
        date: String,
    },
}

/// A semantic slice of a repository: one definition or one commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Unique within a repository's store; empty until the extractor numbers it.
    pub id: String,
    pub text: String,
    pub meta: ChunkMeta,
}

impl Chunk {
    #[must_use]
    pub fn code(kind: ChunkKind, language: Lang, path: &str, name: &str, text: String) -> Self {
        Self {
            id: String::new(),
            text,
            meta: ChunkMeta::Code {
                kind,
                language,
                path: path.to_owned(),
                name: name.to_owned(),
            },
        }
    }

    #[must_use]
    pub fn commit(sha: &str, date: &str, message: &str) -> Self {
        Self {
            id: String::new(),
            text: message.to_owned(),
            meta: ChunkMeta::Commit {
                sha: sha.to_owned(),
                date: date.to_owned(),
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        match &self.meta {
            ChunkMeta::Code { kind, .. } => *kind,
            ChunkMeta::Commit { .. } => ChunkKind::Commit,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.meta {
            ChunkMeta::Code { name, .. } => Some(name),
            ChunkMeta::Commit { .. } => None,
        }
    }

    /// Metadata fields stored beside the vector, without the document text.
    #[must_use]
    pub fn metadata(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::from([("type".to_owned(), self.kind().as_str().into())]);
        match &self.meta {
            ChunkMeta::Code {
                language,
                path,
                name,
                ..
            } => {
                map.insert("language".into(), language.id().into());
                map.insert("path".into(), path.as_str().into());
                map.insert("name".into(), name.as_str().into());
            }
            ChunkMeta::Commit { sha, date } => {
                map.insert("sha".into(), sha.as_str().into());
                map.insert("date".into(), date.as_str().into());
            }
        }
        map
    }
}

/// Number chunks in order: code chunks get `code_{i}`, commits `commit_{i}`.
pub fn assign_ids(code: &mut [Chunk], commits: &mut [Chunk]) {
    for (i, chunk) in code.iter_mut().enumerate() {
        chunk.id = format!("{}_{i}", chunk.kind().id_prefix());
    }
    for (i, chunk) in commits.iter_mut().enumerate() {
        chunk.id = format!("{}_{i}", ChunkKind::Commit.id_prefix());
    }
}

//! Syntax-tree strategy: every function and class-like definition, nested ones included.

use tree_sitter::{Node, Parser};

use super::ChunkStrategy;
use crate::chunk::{Chunk, ChunkKind};
use crate::error::{IndexError, Result};
use crate::languages::Lang;

#[derive(Debug, Default, Clone, Copy)]
pub struct AstStrategy;

impl AstStrategy {
    fn classify(lang: Lang, kind: &str) -> Option<ChunkKind> {
        match (lang, kind) {
            (Lang::Python, "function_definition")
            | (Lang::Rust, "function_item")
            | (Lang::Go, "function_declaration" | "method_declaration") => {
                Some(ChunkKind::Function)
            }
            (Lang::Python, "class_definition")
            | (
                Lang::Rust,
                "struct_item" | "enum_item" | "union_item" | "trait_item" | "impl_item",
            )
            | (Lang::Go, "type_declaration") => Some(ChunkKind::Class),
            _ => None,
        }
    }
}

impl ChunkStrategy for AstStrategy {
    fn extract(&self, source: &str, path: &str, lang: Lang) -> Result<Vec<Chunk>> {
        let grammar = lang
            .grammar()
            .ok_or_else(|| IndexError::Parse(format!("no grammar for {}", lang.id())))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| IndexError::Parse(format!("parse failed for {path}")))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(IndexError::Parse(format!("syntax errors in {path}")));
        }

        let lines: Vec<&str> = source.lines().collect();
        let mut chunks = Vec::new();
        let mut cursor = root.walk();
        let mut stack = vec![root];

        // Pre-order so outer definitions precede the ones nested in them.
        while let Some(node) = stack.pop() {
            if let Some(kind) = Self::classify(lang, node.kind()) {
                let start = node.start_position().row;
                let end = node.end_position().row.min(lines.len().saturating_sub(1));
                let text = lines.get(start..=end).map_or_else(String::new, |l| l.join("\n"));
                let name = entity_name(&node, source).unwrap_or_else(|| "anonymous".to_owned());
                chunks.push(Chunk::code(kind, lang, path, &name, text));
            }
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        Ok(chunks)
    }
}

fn entity_name(node: &Node, source: &str) -> Option<String> {
    let named = node
        .child_by_field_name("name")
        // impl blocks carry their subject in `type`
        .or_else(|| node.child_by_field_name("type"))
        .or_else(|| {
            // Go `type Foo struct {}` nests the name in a type_spec
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .find(|c| matches!(c.kind(), "type_spec" | "type_alias"))
                .and_then(|spec| spec.child_by_field_name("name"))
        })?;
    Some(source[named.byte_range()].to_string())
}

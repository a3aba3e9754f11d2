/*!
# Expression Analysis

Walks one renderable sub-expression and reports which reactive fields it references,
its nominal view constructor, and whether that constructor is a layout container.
*/

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::ast::{AstWalker, NodeKind, SyntaxNode};
use crate::config::Vocabulary;

use super::dependencies::ReactiveField;

/// Constructor name reported when a sub-expression contains no call
pub const UNKNOWN_VIEW_TYPE: &str = "Unknown";

/// The closed set of layout/iteration constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    VerticalStack,
    HorizontalStack,
    DepthStack,
    LazyVerticalStack,
    LazyHorizontalStack,
    List,
    ForEach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionAnalysis {
    /// Reactive fields referenced anywhere in the tree, sorted and deduplicated
    pub used_fields: BTreeSet<String>,
    pub constructor_name: String,
    pub is_container: bool,
}

/// Analyzer bound to one view's reactive fields
pub struct ExpressionAnalyzer<'a> {
    fields: HashSet<&'a str>,
    vocabulary: &'a Vocabulary,
}

impl<'a> ExpressionAnalyzer<'a> {
    pub fn new(fields: &'a [ReactiveField], vocabulary: &'a Vocabulary) -> Self {
        Self {
            fields: fields.iter().map(|field| field.name.as_str()).collect(),
            vocabulary,
        }
    }

    /// Analyze one sub-expression. Never fails.
    ///
    /// Every bare identifier naming a reactive field counts as a use, even when a local
    /// binding shadows it. Every call node overwrites the constructor name, so the
    /// last call visited in pre-order wins, not the outermost one.
    pub fn analyze<N: SyntaxNode>(&self, root: &N) -> ExpressionAnalysis {
        let mut used_fields = BTreeSet::new();
        let mut constructor_name: Option<String> = None;

        AstWalker::walk(root, &mut |node: &N| match node.kind() {
            NodeKind::Identifier(name) if self.fields.contains(name) => {
                used_fields.insert(name.to_string());
            }
            NodeKind::Call { callee } => constructor_name = Some(callee),
            _ => {}
        });

        let constructor_name = constructor_name.unwrap_or_else(|| UNKNOWN_VIEW_TYPE.to_string());
        let is_container = self.vocabulary.container_kind(&constructor_name).is_some();

        ExpressionAnalysis {
            used_fields,
            constructor_name,
            is_container,
        }
    }
}

//! Core data models for the symdex index.
//!
//! These types represent the entities, search projections, and statistics
//! snapshots that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed dimensionality of every stored embedding vector.
pub const EMBEDDING_DIMS: usize = 384;

/// Kind of a code entity, with an open fallback for tags the canonical set
/// does not cover. Keeping this total makes statistics grouping and id
/// prefix derivation total functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Function,
    Class,
    Method,
    Migration,
    Interface,
    Struct,
    Enum,
    Module,
    Variable,
    Other(String),
}

impl EntityKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "function" => EntityKind::Function,
            "class" => EntityKind::Class,
            "method" => EntityKind::Method,
            "migration" => EntityKind::Migration,
            "interface" => EntityKind::Interface,
            "struct" => EntityKind::Struct,
            "enum" => EntityKind::Enum,
            "module" => EntityKind::Module,
            "variable" => EntityKind::Variable,
            other => EntityKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Class => "class",
            EntityKind::Method => "method",
            EntityKind::Migration => "migration",
            EntityKind::Interface => "interface",
            EntityKind::Struct => "struct",
            EntityKind::Enum => "enum",
            EntityKind::Module => "module",
            EntityKind::Variable => "variable",
            EntityKind::Other(tag) => tag,
        }
    }

    /// Short prefix used by [`CodeEntity::derive_id`].
    pub fn id_prefix(&self) -> String {
        match self {
            EntityKind::Function => "func".to_string(),
            EntityKind::Class => "class".to_string(),
            EntityKind::Method => "method".to_string(),
            EntityKind::Migration => "migration".to_string(),
            EntityKind::Interface => "iface".to_string(),
            other => other.as_str().to_lowercase(),
        }
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        EntityKind::parse(&s)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language tag, with an `Unknown` default and an open fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    Rust,
    Go,
    Java,
    CSharp,
    Sql,
    #[default]
    Unknown,
    Other(String),
}

impl Language {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "python" => Language::Python,
            "typescript" => Language::TypeScript,
            "javascript" => Language::JavaScript,
            "rust" => Language::Rust,
            "go" => Language::Go,
            "java" => Language::Java,
            "csharp" => Language::CSharp,
            "sql" => Language::Sql,
            "" | "unknown" => Language::Unknown,
            other => Language::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Sql => "sql",
            Language::Unknown => "unknown",
            Language::Other(tag) => tag,
        }
    }
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        Language::parse(&s)
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.as_str().to_string()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter of a function or method signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
}

/// Return type of a function or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnInfo {
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub nullable: bool,
}

/// A supertype or implemented interface, as written at the definition site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub generics: Vec<String>,
}

/// An outgoing call edge recorded at extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRef {
    #[serde(default)]
    pub target_id: String,
    pub target_name: String,
    #[serde(default)]
    pub line: i64,
}

/// One indexed unit of source code.
///
/// Required identity fields are always present; the structured graph and
/// correlation fields are each independently optional. `embedding` is
/// attached during ingestion when absent from the payload and preserved
/// verbatim when supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub id: String,
    pub name: String,
    /// `file + "::" + name`; stored explicitly, kept in agreement on write.
    pub fqn: String,
    pub kind: EntityKind,
    pub content: String,
    #[serde(default)]
    pub signature: String,
    pub file: String,
    pub line_start: i64,
    #[serde(default)]
    pub line_end: i64,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<Vec<TypeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<Vec<TypeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<Vec<CallRef>>,
    /// API paths this entity serves or calls; correlation key across languages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoints: Option<Vec<String>>,
    /// Database tables this entity touches; correlation key across languages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_tables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl CodeEntity {
    /// Derive the canonical entity id: `{kind_prefix}_{file}_{name}_{line_start}`.
    ///
    /// Path separators in `file` are flattened to `_`; two entities with
    /// identical (kind, file, name, line_start) collide by design and the
    /// later write wins.
    pub fn derive_id(kind: &EntityKind, file: &str, name: &str, line_start: i64) -> String {
        let file = file.replace(['/', '\\'], "_");
        format!("{}_{}_{}_{}", kind.id_prefix(), file, name, line_start)
    }

    /// Canonical fully-qualified name for a (file, name) pair.
    pub fn fqn_of(file: &str, name: &str) -> String {
        format!("{}::{}", file, name)
    }
}

/// A read projection of [`CodeEntity`] plus a relevance score.
///
/// Scores are backend-specific (negated BM25 rank for lexical, cosine
/// similarity for semantic) and are not comparable across modes.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub fqn: String,
    pub kind: EntityKind,
    pub file: String,
    pub line_start: i64,
    pub line_end: i64,
    pub language: Language,
    pub signature: String,
    /// Text excerpt for display.
    pub snippet: String,
    pub score: f64,
}

/// Response of a hybrid search: both raw result lists plus the size of
/// their id-union. The lists are intentionally not merged into one ranking.
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearch {
    pub text: Vec<SearchResult>,
    pub semantic: Vec<SearchResult>,
    pub combined_count: usize,
}

/// Corpus-wide statistics snapshot.
///
/// `last_updated` is the computation time, not the last write time.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_entities: i64,
    pub entities_by_kind: BTreeMap<String, i64>,
    pub entities_by_language: BTreeMap<String, i64>,
    pub total_files: i64,
    pub index_size_mb: f64,
    pub last_updated: String,
}

impl Statistics {
    /// Zeroed snapshot returned when the backing store cannot be queried.
    pub fn empty() -> Self {
        Statistics {
            total_entities: 0,
            entities_by_kind: BTreeMap::new(),
            entities_by_language: BTreeMap::new(),
            total_files: 0,
            index_size_mb: 0.0,
            last_updated: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(EntityKind::parse("function"), EntityKind::Function);
        assert_eq!(EntityKind::Function.as_str(), "function");
        assert_eq!(
            EntityKind::parse("decorator"),
            EntityKind::Other("decorator".to_string())
        );
        assert_eq!(EntityKind::parse("decorator").as_str(), "decorator");
    }

    #[test]
    fn test_kind_id_prefix() {
        assert_eq!(EntityKind::Function.id_prefix(), "func");
        assert_eq!(EntityKind::Class.id_prefix(), "class");
        assert_eq!(EntityKind::Interface.id_prefix(), "iface");
        assert_eq!(EntityKind::Other("Trait".to_string()).id_prefix(), "trait");
    }

    #[test]
    fn test_language_default_unknown() {
        assert_eq!(Language::default(), Language::Unknown);
        assert_eq!(Language::parse(""), Language::Unknown);
        assert_eq!(Language::parse("zig"), Language::Other("zig".to_string()));
    }

    #[test]
    fn test_derive_id() {
        assert_eq!(
            CodeEntity::derive_id(&EntityKind::Function, "test.py", "calculate", 42),
            "func_test.py_calculate_42"
        );
        assert_eq!(
            CodeEntity::derive_id(&EntityKind::Class, "src/models.py", "User", 1),
            "class_src_models.py_User_1"
        );
    }

    #[test]
    fn test_fqn_of() {
        assert_eq!(CodeEntity::fqn_of("test.py", "calculate"), "test.py::calculate");
    }

    #[test]
    fn test_kind_serde_as_string() {
        let kind: EntityKind = serde_json::from_str("\"function\"").unwrap();
        assert_eq!(kind, EntityKind::Function);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"function\"");

        let kind: EntityKind = serde_json::from_str("\"fixture\"").unwrap();
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"fixture\"");
    }
}

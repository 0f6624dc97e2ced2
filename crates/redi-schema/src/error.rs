//! Error types for schema parsing, conversion, and validation.

use thiserror::Error;

/// Errors raised while lexing/parsing a Prisma-compatible schema source.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{file}:{line}:{column}: unexpected character '{found}'")]
    UnexpectedChar {
        file: String,
        line: usize,
        column: usize,
        found: char,
    },
    #[error("{file}:{line}:{column}: unterminated string literal")]
    UnterminatedString {
        file: String,
        line: usize,
        column: usize,
    },
    #[error("{file}:{line}:{column}: expected {expected}, found {found}")]
    UnexpectedToken {
        file: String,
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },
    #[error("{file}: unexpected end of input, expected {expected}")]
    UnexpectedEof { file: String, expected: String },
}

/// Errors raised while converting a parsed AST into the schema IR, or while
/// validating an IR `Schema` (§4.1).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SchemaError {
    #[error("schema has no name")]
    EmptyName,

    #[error("model '{0}' has no table name")]
    EmptyTableName(String),

    #[error("model '{0}' has no fields")]
    NoFields(String),

    #[error("model '{0}' declares more than one single-field primary key: {1:?}")]
    MultiplePrimaryKeys(String, Vec<String>),

    #[error("model '{0}' declares both a field-level @id and a @@id composite key")]
    BothSingleAndCompositePrimaryKey(String),

    #[error("model '{0}' has no primary key")]
    NoPrimaryKey(String),

    #[error("model '{0}' composite key references unknown field '{1}'")]
    UnknownCompositeKeyField(String, String),

    #[error("model '{0}' field '{1}' is not found")]
    UnknownField(String, String),

    #[error("model '{0}' has no such relation '{1}'")]
    UnknownRelation(String, String),

    #[error(
        "column name collision in model '{0}': fields '{1}' and '{2}' both map to column '{3}'"
    )]
    ColumnNameCollision(String, String, String, String),

    #[error("relation '{0}' on model '{1}' references unknown model '{2}'")]
    UnknownRelatedModel(String, String, String),

    #[error(
        "relation '{0}' on model '{1}' foreign key '{2}' does not resolve to a field on '{1}'"
    )]
    UnresolvedForeignKey(String, String, String),

    #[error(
        "relation '{0}' on model '{1}' references field '{2}' which does not exist on '{3}'"
    )]
    UnresolvedReference(String, String, String, String),

    #[error("model '{0}' is declared more than once")]
    DuplicateModel(String),

    #[error("enum '{0}' is declared more than once")]
    DuplicateEnum(String),

    #[error(
        "relation '{field}' is declared with @relation on both '{model_a}' and '{model_b}' with incompatible attributes"
    )]
    ConflictingRelationDeclaration {
        field: String,
        model_a: String,
        model_b: String,
    },

    #[error("list field '{0}.{1}' has no inverse relation declared on '{2}'")]
    MissingInverseRelation(String, String, String),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type ParseResult<T> = Result<T, ParseError>;
pub type SchemaResult<T> = Result<T, SchemaError>;

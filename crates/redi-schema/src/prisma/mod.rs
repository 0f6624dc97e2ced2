//! Prisma-compatible schema DSL: lex, parse, convert (§4.2).

pub mod ast;
pub mod convert;
pub mod lexer;
pub mod parser;

use crate::error::SchemaResult;
use crate::model::{EnumDef, Schema};

/// Parses and converts a full schema source into IR models and enums in one
/// call. `file` is used only for error messages.
pub fn parse_schema(file: &str, source: &str) -> SchemaResult<(Vec<Schema>, Vec<EnumDef>)> {
    let ast = parser::Parser::parse(file, source)?;
    let converted = convert::convert(&ast)?;
    Ok((converted.schemas, converted.enums))
}

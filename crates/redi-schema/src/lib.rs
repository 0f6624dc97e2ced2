//! Schema intermediate representation and Prisma-compatible DSL parser
//! (C1/C2, §3/§4.1/§4.2). Every other crate depends on this one for its
//! definition of a model, field, relation, and registry; it has no
//! dependency of its own on any driver or query-execution concern.

pub mod error;
pub mod model;
pub mod naming;
pub mod prisma;
pub mod registry;

pub use error::{ParseError, SchemaError};
pub use model::{
    DefaultValue, EnumDef, Field, FieldType, Index, LiteralValue, ReferentialAction, Relation,
    RelationType, Schema,
};
pub use prisma::parse_schema;
pub use registry::SchemaRegistry;

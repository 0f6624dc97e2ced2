//! Phase 2 AST produced by the recursive-descent parser (§4.2).

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    String(String),
    Number(String),
    Ident(String),
    /// `fields: [a, b]`
    List(Vec<Expr>),
    /// `now()`, `autoincrement()`, `uuid()`, `cuid()`, or any other call.
    Call(String, Vec<Argument>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldTypeRef {
    pub name: String,
    pub list: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub field_type: FieldTypeRef,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    /// Block-level `@@...` attributes.
    pub block_attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDecl {
    pub name: String,
    pub map: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<EnumValueDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Model(ModelDecl),
    Enum(EnumDecl),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    pub statements: Vec<Statement>,
}

//! Converter (§4.2): AST → IR. Traverses the parsed [`Ast`], classifies
//! each field as scalar or relation, and infers the two sides of every
//! relation the way Prisma does: the field carrying
//! `@relation(fields: [...], references: [...])` is the owning
//! (foreign-key-holding) side; its peer is inferred from the matching field
//! on the other model.

use std::collections::HashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::model::{
    DefaultValue, Field, FieldType, Index, LiteralValue, ReferentialAction, Relation, RelationType,
    Schema,
};
use crate::prisma::ast::{Argument, Ast, Attribute, EnumDecl, Expr, FieldDecl, ModelDecl, Statement};

pub struct ConvertedSchema {
    pub schemas: Vec<Schema>,
    pub enums: Vec<crate::model::EnumDef>,
}

pub fn convert(ast: &Ast) -> SchemaResult<ConvertedSchema> {
    let mut model_decls: Vec<&ModelDecl> = Vec::new();
    let mut enum_decls: Vec<&EnumDecl> = Vec::new();

    for stmt in &ast.statements {
        match stmt {
            Statement::Model(m) => model_decls.push(m),
            Statement::Enum(e) => enum_decls.push(e),
        }
    }

    let mut seen_models = HashMap::new();
    for m in &model_decls {
        if seen_models.insert(m.name.clone(), ()).is_some() {
            return Err(SchemaError::DuplicateModel(m.name.clone()));
        }
    }
    let mut seen_enums = HashMap::new();
    for e in &enum_decls {
        if seen_enums.insert(e.name.clone(), ()).is_some() {
            return Err(SchemaError::DuplicateEnum(e.name.clone()));
        }
    }

    let model_names: HashMap<&str, &ModelDecl> =
        model_decls.iter().map(|m| (m.name.as_str(), *m)).collect();
    let enum_names: HashMap<&str, &EnumDecl> =
        enum_decls.iter().map(|e| (e.name.as_str(), *e)).collect();

    let mut schemas = Vec::new();
    for model in &model_decls {
        schemas.push(convert_model(model, &model_names, &enum_names)?);
    }
    infer_relations(&model_decls, &model_names, &mut schemas)?;

    let enums = enum_decls
        .iter()
        .map(|e| crate::model::EnumDef {
            name: e.name.clone(),
            values: e.values.iter().map(|v| (v.name.clone(), v.map.clone())).collect(),
        })
        .collect();

    Ok(ConvertedSchema { schemas, enums })
}

fn is_relation_field(field_type_name: &str, model_names: &HashMap<&str, &ModelDecl>) -> bool {
    model_names.contains_key(field_type_name)
}

fn convert_model(
    model: &ModelDecl,
    model_names: &HashMap<&str, &ModelDecl>,
    enum_names: &HashMap<&str, &EnumDecl>,
) -> SchemaResult<Schema> {
    let mut schema = Schema::new(model.name.clone());

    for field_decl in &model.fields {
        if is_relation_field(&field_decl.field_type.name, model_names) {
            continue; // handled by infer_relations
        }
        schema = schema.add_field(convert_scalar_field(field_decl, enum_names)?);
    }

    for attr in &model.block_attributes {
        schema = apply_block_attribute(schema, attr, &model.name)?;
    }

    Ok(schema)
}

fn convert_scalar_field(
    field_decl: &FieldDecl,
    enum_names: &HashMap<&str, &EnumDecl>,
) -> SchemaResult<Field> {
    let base_type = scalar_field_type(&field_decl.field_type.name, enum_names);
    let ty = if field_decl.field_type.list {
        FieldType::Array(Box::new(base_type))
    } else {
        base_type
    };

    let mut field = Field::new(field_decl.name.clone(), ty);
    field.nullable = field_decl.field_type.optional;

    for attr in &field_decl.attributes {
        apply_field_attribute(&mut field, attr)?;
    }

    Ok(field)
}

fn scalar_field_type(name: &str, _enum_names: &HashMap<&str, &EnumDecl>) -> FieldType {
    match name {
        "String" => FieldType::String,
        "Int" => FieldType::Int,
        "Int64" | "BigInt" => FieldType::Int64,
        "Float" => FieldType::Float,
        "Boolean" | "Bool" => FieldType::Bool,
        "DateTime" => FieldType::DateTime,
        "Json" => FieldType::Json,
        "Decimal" => FieldType::Decimal,
        // An enum name (declared or not) is carried as metadata; the
        // registry cross-checks it against declared enums at registration.
        other => FieldType::Enum(other.to_string()),
    }
}

fn apply_field_attribute(field: &mut Field, attr: &Attribute) -> SchemaResult<()> {
    match attr.name.as_str() {
        "id" => field.primary_key = true,
        "unique" => field.unique = true,
        "default" => {
            let value = parse_default(attr)?;
            if value == DefaultValue::AutoIncrement {
                field.auto_increment = true;
            }
            field.default = Some(value);
        }
        "map" => {
            if let Some(name) = string_arg(attr, 0) {
                field.map = Some(name);
            }
        }
        name if name.starts_with("db.") => {
            let native_name = name.trim_start_matches("db.").to_string();
            let args = attr
                .arguments
                .iter()
                .map(|a| expr_to_string(&a.value))
                .collect();
            field.native_type = Some((native_name, args));
        }
        "relation" | "index" => {} // consumed elsewhere
        _ => {}
    }
    Ok(())
}

fn apply_block_attribute(mut schema: Schema, attr: &Attribute, model_name: &str) -> SchemaResult<Schema> {
    match attr.name.as_str() {
        "map" => {
            if let Some(name) = string_arg(attr, 0) {
                schema.table_name = Some(name);
            }
        }
        "id" => {
            let fields = list_ident_arg(attr, "fields").unwrap_or_default();
            for f in &fields {
                if schema.field(f).is_none() {
                    return Err(SchemaError::UnknownCompositeKeyField(
                        model_name.to_string(),
                        f.clone(),
                    ));
                }
            }
            schema.composite_key = Some(fields);
        }
        "index" => {
            let fields = list_ident_arg(attr, "fields").unwrap_or_default();
            let name = named_string_arg(attr, "map")
                .unwrap_or_else(|| format!("{}_{}_idx", schema.resolved_table_name(), fields.join("_")));
            schema = schema.add_index(Index { name, fields, unique: false });
        }
        "unique" => {
            let fields = list_ident_arg(attr, "fields").unwrap_or_default();
            let name = named_string_arg(attr, "map")
                .unwrap_or_else(|| format!("{}_{}_key", schema.resolved_table_name(), fields.join("_")));
            schema = schema.add_index(Index { name, fields, unique: true });
        }
        _ => {}
    }
    Ok(schema)
}

fn parse_default(attr: &Attribute) -> SchemaResult<DefaultValue> {
    let Some(arg) = attr.arguments.first() else {
        return Ok(DefaultValue::Literal(LiteralValue::Bool(false)));
    };
    Ok(match &arg.value {
        Expr::Call(name, _) => match name.as_str() {
            "now" => DefaultValue::Now,
            "autoincrement" => DefaultValue::AutoIncrement,
            "uuid" => DefaultValue::Uuid,
            "cuid" => DefaultValue::Cuid,
            _ => DefaultValue::Literal(LiteralValue::String(name.clone())),
        },
        Expr::String(s) => DefaultValue::Literal(LiteralValue::String(s.clone())),
        Expr::Number(n) => {
            if let Ok(i) = n.parse::<i64>() {
                DefaultValue::Literal(LiteralValue::Int(i))
            } else {
                DefaultValue::Literal(LiteralValue::Float(n.parse().unwrap_or(0.0)))
            }
        }
        Expr::Ident(ident) => match ident.as_str() {
            "true" => DefaultValue::Literal(LiteralValue::Bool(true)),
            "false" => DefaultValue::Literal(LiteralValue::Bool(false)),
            other => DefaultValue::Literal(LiteralValue::EnumValue(other.to_string())),
        },
        Expr::List(items) => DefaultValue::Literal(LiteralValue::List(
            items.iter().map(expr_to_literal).collect(),
        )),
    })
}

fn expr_to_literal(expr: &Expr) -> LiteralValue {
    match expr {
        Expr::String(s) => LiteralValue::String(s.clone()),
        Expr::Number(n) => n.parse::<i64>().map(LiteralValue::Int).unwrap_or(LiteralValue::Float(0.0)),
        Expr::Ident(i) => LiteralValue::EnumValue(i.clone()),
        Expr::List(items) => LiteralValue::List(items.iter().map(expr_to_literal).collect()),
        Expr::Call(name, _) => LiteralValue::String(name.clone()),
    }
}

fn expr_to_string(expr: &Expr) -> String {
    match expr {
        Expr::String(s) => s.clone(),
        Expr::Number(n) => n.clone(),
        Expr::Ident(i) => i.clone(),
        Expr::List(items) => items.iter().map(expr_to_string).collect::<Vec<_>>().join(","),
        Expr::Call(name, _) => name.clone(),
    }
}

fn string_arg(attr: &Attribute, index: usize) -> Option<String> {
    attr.arguments.get(index).and_then(|a| match &a.value {
        Expr::String(s) => Some(s.clone()),
        _ => None,
    })
}

fn named_arg<'a>(attr: &'a Attribute, name: &str) -> Option<&'a Argument> {
    attr.arguments.iter().find(|a| a.name.as_deref() == Some(name))
}

fn named_string_arg(attr: &Attribute, name: &str) -> Option<String> {
    named_arg(attr, name).and_then(|a| match &a.value {
        Expr::String(s) => Some(s.clone()),
        _ => None,
    })
}

fn list_ident_arg(attr: &Attribute, name: &str) -> Option<Vec<String>> {
    let arg = named_arg(attr, name).or_else(|| attr.arguments.iter().find(|a| a.name.is_none()))?;
    match &arg.value {
        Expr::List(items) => Some(
            items
                .iter()
                .filter_map(|e| match e {
                    Expr::Ident(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn referential_action(value: &str) -> Option<ReferentialAction> {
    match value {
        "Cascade" => Some(ReferentialAction::Cascade),
        "Restrict" => Some(ReferentialAction::Restrict),
        "SetNull" => Some(ReferentialAction::SetNull),
        "SetDefault" => Some(ReferentialAction::SetDefault),
        "NoAction" => Some(ReferentialAction::NoAction),
        _ => None,
    }
}

/// One model's relation-shaped field, classified for pairing.
struct RelationFieldRef<'a> {
    model: &'a str,
    field: &'a FieldDecl,
    peer_model: &'a str,
    relation_attr: Option<&'a Attribute>,
}

fn infer_relations(
    model_decls: &[&ModelDecl],
    model_names: &HashMap<&str, &ModelDecl>,
    schemas: &mut [Schema],
) -> SchemaResult<()> {
    let mut refs: Vec<RelationFieldRef> = Vec::new();
    for model in model_decls {
        for field in &model.fields {
            if !is_relation_field(&field.field_type.name, model_names) {
                continue;
            }
            let relation_attr = field.attributes.iter().find(|a| a.name == "relation");
            refs.push(RelationFieldRef {
                model: &model.name,
                field,
                peer_model: &field.field_type.name,
                relation_attr,
            });
        }
    }

    let owns_fk = |r: &RelationFieldRef| {
        r.relation_attr
            .map(|a| named_arg(a, "fields").is_some() && named_arg(a, "references").is_some())
            .unwrap_or(false)
    };

    // Both sides declaring the foreign key is ambiguous: reject rather than
    // silently pick one, unlike the tolerant behaviour of the source this
    // was modelled on.
    for i in 0..refs.len() {
        if !owns_fk(&refs[i]) {
            continue;
        }
        if let Some(j) = refs
            .iter()
            .position(|r| r.model == refs[i].peer_model && r.peer_model == refs[i].model && owns_fk(r))
        {
            return Err(SchemaError::ConflictingRelationDeclaration {
                field: refs[i].field.name.clone(),
                model_a: refs[i].model.to_string(),
                model_b: refs[j].model.to_string(),
            });
        }
    }

    let mut handled: Vec<bool> = vec![false; refs.len()];

    for i in 0..refs.len() {
        if handled[i] {
            continue;
        }
        let owning = &refs[i];
        if !owns_fk(owning) {
            continue;
        }

        // Find the peer field: declared on `peer_model`, pointing back at
        // `model`, without its own fields/references (the non-owning side).
        let peer_idx = refs.iter().position(|r| {
            r.model == owning.peer_model
                && r.peer_model == owning.model
                && r.relation_attr
                    .map(|a| named_arg(a, "fields").is_none())
                    .unwrap_or(true)
        });

        let fk_fields = list_ident_arg(owning.relation_attr.unwrap(), "fields").unwrap_or_default();
        let references = list_ident_arg(owning.relation_attr.unwrap(), "references")
            .unwrap_or_else(|| {
                model_names
                    .get(owning.peer_model)
                    .and_then(|m| m.fields.iter().find(|f| f.attributes.iter().any(|a| a.name == "id")))
                    .map(|f| vec![f.name.clone()])
                    .unwrap_or_default()
            });

        for fk in &fk_fields {
            let owner_schema = schemas.iter().find(|s| s.name == owning.model).unwrap();
            if owner_schema.field(fk).is_none() {
                return Err(SchemaError::UnresolvedForeignKey(
                    owning.field.name.clone(),
                    owning.model.to_string(),
                    fk.clone(),
                ));
            }
        }

        let on_delete = owning
            .relation_attr
            .and_then(|a| named_string_arg(a, "onDelete"))
            .or_else(|| owning.relation_attr.and_then(|a| named_arg(a, "onDelete")).map(|a| expr_to_string(&a.value)))
            .and_then(|v| referential_action(&v));
        let on_update = owning
            .relation_attr
            .and_then(|a| named_arg(a, "onUpdate"))
            .map(|a| expr_to_string(&a.value))
            .and_then(|v| referential_action(&v));

        let peer_is_list = peer_idx.map(|p| refs[p].field.field_type.list).unwrap_or(true);
        let owning_type = if peer_is_list { RelationType::ManyToOne } else { RelationType::OneToOne };

        let owner_idx = schemas.iter().position(|s| s.name == owning.model).unwrap();
        schemas[owner_idx] = std::mem::replace(&mut schemas[owner_idx], Schema::new(""))
            .add_relation(Relation {
                field_name: owning.field.name.clone(),
                r#type: owning_type,
                model: owning.peer_model.to_string(),
                foreign_key: fk_fields.clone(),
                references: references.clone(),
                on_delete,
                on_update,
                through_table: None,
            });

        if let Some(peer_idx) = peer_idx {
            handled[peer_idx] = true;
            let peer = &refs[peer_idx];
            let inverse_type = if peer.field.field_type.list {
                RelationType::OneToMany
            } else {
                RelationType::OneToOne
            };
            let peer_schema_idx = schemas.iter().position(|s| s.name == peer.model).unwrap();
            schemas[peer_schema_idx] = std::mem::replace(&mut schemas[peer_schema_idx], Schema::new(""))
                .add_relation(Relation {
                    field_name: peer.field.name.clone(),
                    r#type: inverse_type,
                    model: peer.peer_model.to_string(),
                    foreign_key: fk_fields.clone(),
                    references: references.clone(),
                    on_delete: None,
                    on_update: None,
                    through_table: None,
                });
        }
        handled[i] = true;
    }

    // Remaining unhandled refs are either (a) implicit many-to-many (both
    // sides are lists, neither owns an FK) or (b) a malformed inverse with
    // no owning peer.
    for i in 0..refs.len() {
        if handled[i] {
            continue;
        }
        let r = &refs[i];
        if !r.field.field_type.list {
            return Err(SchemaError::MissingInverseRelation(
                r.model.to_string(),
                r.field.name.to_string(),
                r.peer_model.to_string(),
            ));
        }
        // Implicit many-to-many: pair the two list-typed, FK-less sides.
        let peer_idx = refs.iter().position(|p| {
            p.model == r.peer_model && p.peer_model == r.model && p.field.field_type.list
        });
        let Some(peer_idx) = peer_idx else {
            return Err(SchemaError::MissingInverseRelation(
                r.model.to_string(),
                r.field.name.to_string(),
                r.peer_model.to_string(),
            ));
        };
        if handled[peer_idx] {
            continue;
        }

        let mut names = [r.model, r.peer_model];
        names.sort();
        let through_table = format!("_{}To{}", names[0], names[1]);

        let owner_idx = schemas.iter().position(|s| s.name == r.model).unwrap();
        schemas[owner_idx] = std::mem::replace(&mut schemas[owner_idx], Schema::new(""))
            .add_relation(Relation {
                field_name: r.field.name.clone(),
                r#type: RelationType::ManyToMany,
                model: r.peer_model.to_string(),
                foreign_key: vec![],
                references: vec![],
                on_delete: None,
                on_update: None,
                through_table: Some(through_table.clone()),
            });

        let peer = &refs[peer_idx];
        let peer_schema_idx = schemas.iter().position(|s| s.name == peer.model).unwrap();
        schemas[peer_schema_idx] = std::mem::replace(&mut schemas[peer_schema_idx], Schema::new(""))
            .add_relation(Relation {
                field_name: peer.field.name.clone(),
                r#type: RelationType::ManyToMany,
                model: peer.peer_model.to_string(),
                foreign_key: vec![],
                references: vec![],
                on_delete: None,
                on_update: None,
                through_table: Some(through_table),
            });

        handled[i] = true;
        handled[peer_idx] = true;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prisma::parser::Parser;

    fn convert_src(src: &str) -> ConvertedSchema {
        let ast = Parser::parse("t.prisma", src).unwrap();
        convert(&ast).unwrap()
    }

    #[test]
    fn converts_scalar_fields_and_attributes() {
        let converted = convert_src(
            r#"
            model User {
              id     Int     @id @default(autoincrement())
              email  String  @unique
              age    Int?
              active Boolean @default(true)
            }
            "#,
        );
        let user = converted.schemas.iter().find(|s| s.name == "User").unwrap();
        assert!(user.field("id").unwrap().primary_key);
        assert_eq!(user.field("id").unwrap().default, Some(DefaultValue::AutoIncrement));
        assert!(user.field("email").unwrap().unique);
        assert!(user.field("age").unwrap().nullable);
        assert_eq!(
            user.field("active").unwrap().default,
            Some(DefaultValue::Literal(LiteralValue::Bool(true)))
        );
    }

    #[test]
    fn infers_many_to_one_and_one_to_many() {
        let converted = convert_src(
            r#"
            model User {
              id    Int    @id
              posts Post[]
            }
            model Post {
              id       Int  @id
              authorId Int
              author   User @relation(fields: [authorId], references: [id])
            }
            "#,
        );
        let user = converted.schemas.iter().find(|s| s.name == "User").unwrap();
        let post = converted.schemas.iter().find(|s| s.name == "Post").unwrap();

        let user_rel = user.relations.get("posts").unwrap();
        assert_eq!(user_rel.r#type, RelationType::OneToMany);
        assert_eq!(user_rel.model, "Post");

        let post_rel = post.relations.get("author").unwrap();
        assert_eq!(post_rel.r#type, RelationType::ManyToOne);
        assert_eq!(post_rel.foreign_key, vec!["authorId".to_string()]);
        assert_eq!(post_rel.references, vec!["id".to_string()]);
    }

    #[test]
    fn infers_one_to_one() {
        let converted = convert_src(
            r#"
            model User {
              id      Int      @id
              profile Profile?
            }
            model Profile {
              id     Int  @id
              userId Int  @unique
              user   User @relation(fields: [userId], references: [id])
            }
            "#,
        );
        let user = converted.schemas.iter().find(|s| s.name == "User").unwrap();
        let profile = converted.schemas.iter().find(|s| s.name == "Profile").unwrap();
        assert_eq!(user.relations.get("profile").unwrap().r#type, RelationType::OneToOne);
        assert_eq!(profile.relations.get("user").unwrap().r#type, RelationType::OneToOne);
    }

    #[test]
    fn infers_implicit_many_to_many() {
        let converted = convert_src(
            r#"
            model Post {
              id   Int   @id
              tags Tag[]
            }
            model Tag {
              id    Int    @id
              posts Post[]
            }
            "#,
        );
        let post = converted.schemas.iter().find(|s| s.name == "Post").unwrap();
        let tag = converted.schemas.iter().find(|s| s.name == "Tag").unwrap();
        assert_eq!(post.relations.get("tags").unwrap().r#type, RelationType::ManyToMany);
        assert_eq!(tag.relations.get("posts").unwrap().r#type, RelationType::ManyToMany);
        assert_eq!(
            post.relations.get("tags").unwrap().through_table,
            tag.relations.get("posts").unwrap().through_table
        );
    }

    #[test]
    fn rejects_list_field_with_no_inverse_owner() {
        let ast = Parser::parse(
            "t.prisma",
            r#"
            model Post {
              id     Int    @id
              author User[]
            }
            model User {
              id Int @id
            }
            "#,
        )
        .unwrap();
        assert!(matches!(convert(&ast), Err(SchemaError::MissingInverseRelation(_, _, _))));
    }

    #[test]
    fn block_map_and_index_attributes() {
        let converted = convert_src(
            r#"
            model User {
              id        Int    @id
              firstName String
              lastName  String

              @@map("app_users")
              @@index([firstName, lastName])
              @@unique([firstName, lastName], map: "full_name_key")
            }
            "#,
        );
        let user = converted.schemas.iter().find(|s| s.name == "User").unwrap();
        assert_eq!(user.table_name.as_deref(), Some("app_users"));
        assert_eq!(user.indexes.len(), 2);
        assert!(user.indexes.iter().any(|i| i.unique && i.name == "full_name_key"));
    }

    #[test]
    fn rejects_conflicting_relation_declarations_on_both_sides() {
        let ast = Parser::parse(
            "t.prisma",
            r#"
            model A {
              id  Int @id
              bId Int
              b   B   @relation(fields: [bId], references: [id])
            }
            model B {
              id  Int @id
              aId Int
              a   A   @relation(fields: [aId], references: [id])
            }
            "#,
        )
        .unwrap();
        assert!(matches!(
            convert(&ast),
            Err(SchemaError::ConflictingRelationDeclaration { .. })
        ));
    }

    #[test]
    fn composite_primary_key_from_block_id() {
        let converted = convert_src(
            r#"
            model Membership {
              userId Int
              teamId Int

              @@id([userId, teamId])
            }
            "#,
        );
        let m = converted.schemas.iter().find(|s| s.name == "Membership").unwrap();
        assert_eq!(m.composite_key, Some(vec!["userId".to_string(), "teamId".to_string()]));
    }
}

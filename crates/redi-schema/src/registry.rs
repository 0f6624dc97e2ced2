//! The schema registry: the ordered collection of `Schema`s a `Database`
//! owns, keyed by model name (§3). Modeled as a directed graph of
//! `Name -> Name` edges per design note §9 — schemas never hold references
//! to their peers, only names resolved through this registry at translation
//! time, so hot re-registration and cyclic relation graphs both just work.

use indexmap::IndexMap;

use crate::error::{SchemaError, SchemaResult};
use crate::model::Schema;

/// Read-mostly registry of schemas. Registration runs full validation;
/// registering an invalid schema never partially mutates the registry (§7).
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: IndexMap::new(),
        }
    }

    /// Validates `schema`, then inserts or replaces the entry for its name.
    /// Re-registration with the same name is how a schema is "mutated"
    /// (§3: "mutated only by re-registration").
    pub fn register(&mut self, schema: Schema) -> SchemaResult<()> {
        schema.validate()?;
        self.validate_relations(&schema)?;
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn models(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn validate_relations(&self, schema: &Schema) -> SchemaResult<()> {
        for relation in schema.relations.values() {
            if relation.model != schema.name && !self.schemas.contains_key(&relation.model) {
                return Err(SchemaError::UnknownRelatedModel(
                    relation.field_name.clone(),
                    schema.name.clone(),
                    relation.model.clone(),
                ));
            }
            for fk in &relation.foreign_key {
                if schema.field(fk).is_none() {
                    return Err(SchemaError::UnresolvedForeignKey(
                        relation.field_name.clone(),
                        schema.name.clone(),
                        fk.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Topologically sorts registered models by foreign-key reference
    /// (leaves first) for `SyncSchemas` (§3). Cycles are broken by
    /// returning the involved models in registration order and letting the
    /// caller defer their foreign-key-creating DDL to an ALTER pass, per
    /// §3's "cycles broken by deferring foreign-key creation to ALTER
    /// statements after all tables exist".
    pub fn topological_order(&self) -> Vec<&Schema> {
        let mut visited: IndexMap<&str, bool> = IndexMap::new();
        let mut order: Vec<&str> = Vec::new();

        fn visit<'a>(
            name: &'a str,
            schemas: &'a IndexMap<String, Schema>,
            visited: &mut IndexMap<&'a str, bool>,
            order: &mut Vec<&'a str>,
        ) {
            match visited.get(name) {
                Some(true) => return,
                Some(false) => return, // on the current DFS stack: cycle, defer.
                None => {}
            }
            visited.insert(name, false);
            if let Some(schema) = schemas.get(name) {
                for relation in schema.relations.values() {
                    if relation.model != name && schemas.contains_key(relation.model.as_str()) {
                        visit(relation.model.as_str(), schemas, visited, order);
                    }
                }
            }
            visited.insert(name, true);
            order.push(name);
        }

        for name in self.schemas.keys() {
            visit(name.as_str(), &self.schemas, &mut visited, &mut order);
        }

        order
            .into_iter()
            .filter_map(|name| self.schemas.get(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldType, Relation, RelationType};

    fn pk_field() -> Field {
        let mut f = Field::new("id", FieldType::Int);
        f.primary_key = true;
        f
    }

    #[test]
    fn register_rejects_invalid_schema_without_mutating_registry() {
        let mut reg = SchemaRegistry::new();
        let bad = Schema::new("User");
        assert!(reg.register(bad).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn topological_order_places_referenced_model_first() {
        let mut reg = SchemaRegistry::new();
        reg.register(Schema::new("User").add_field(pk_field())).unwrap();

        let mut post = Schema::new("Post").add_field(pk_field());
        post = post.add_field(Field::new("userId", FieldType::Int));
        post = post.add_relation(Relation {
            field_name: "author".into(),
            r#type: RelationType::ManyToOne,
            model: "User".into(),
            foreign_key: vec!["userId".into()],
            references: vec!["id".into()],
            on_delete: None,
            on_update: None,
            through_table: None,
        });
        reg.register(post).unwrap();

        let order: Vec<&str> = reg.topological_order().iter().map(|s| s.name.as_str()).collect();
        let user_pos = order.iter().position(|n| *n == "User").unwrap();
        let post_pos = order.iter().position(|n| *n == "Post").unwrap();
        assert!(user_pos < post_pos);
    }

    #[test]
    fn register_rejects_relation_to_unknown_model() {
        let mut reg = SchemaRegistry::new();
        let mut post = Schema::new("Post").add_field(pk_field());
        post = post.add_field(Field::new("userId", FieldType::Int));
        post = post.add_relation(Relation {
            field_name: "author".into(),
            r#type: RelationType::ManyToOne,
            model: "User".into(),
            foreign_key: vec!["userId".into()],
            references: vec!["id".into()],
            on_delete: None,
            on_update: None,
            through_table: None,
        });
        assert!(reg.register(post).is_err());
    }
}

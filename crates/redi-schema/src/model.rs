//! Schema IR (C1, §3, §4.1): the in-memory model of entities, fields,
//! relations, indexes, and composite keys that every other component
//! (parser, drivers, query builder, migrator, pull) reads and writes.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::naming::{field_name_to_column_name, model_name_to_table_name};

/// A scalar/structured field type (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Int,
    Int64,
    Float,
    Bool,
    DateTime,
    Json,
    Decimal,
    Enum(String),
    Array(Box<FieldType>),
}

/// A field-level default value. `"now()"`, `"autoincrement()"`, `"uuid()"`,
/// and `"cuid()"` are retained verbatim as sentinels (§4.2) so dialects can
/// recognise them; anything else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Literal(LiteralValue),
    Now,
    AutoIncrement,
    Uuid,
    Cuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    EnumValue(String),
    List(Vec<LiteralValue>),
}

/// One field of a model (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub r#type: FieldType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub nullable: bool,
    pub index: bool,
    pub default: Option<DefaultValue>,
    /// Overrides the column name; otherwise the column is
    /// `snake_case(Name)`.
    pub map: Option<String>,
    /// Raw `@db.X(..)` native-type annotation, stored as metadata (§4.2).
    /// The default type mapping (§4.4) is used regardless of this value;
    /// drivers may consult it to pick a more precise native column type.
    pub native_type: Option<(String, Vec<String>)>,
}

impl Field {
    pub fn new(name: impl Into<String>, r#type: FieldType) -> Self {
        Self {
            name: name.into(),
            r#type,
            primary_key: false,
            auto_increment: false,
            unique: false,
            nullable: false,
            index: false,
            default: None,
            map: None,
            native_type: None,
        }
    }

    pub fn column_name(&self) -> String {
        self.map
            .clone()
            .unwrap_or_else(|| field_name_to_column_name(&self.name))
    }
}

/// Relation cardinality (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    ManyToOne,
    OneToMany,
    OneToOne,
    ManyToMany,
}

/// Referential action taken on delete/update of the referenced row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

/// A relation between two models (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub field_name: String,
    pub r#type: RelationType,
    pub model: String,
    pub foreign_key: Vec<String>,
    pub references: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    /// Join-table name for `ManyToMany`, if any.
    pub through_table: Option<String>,
}

/// An index over one or more fields (§3). A field-level `Unique: true` is
/// equivalent to a single-column unique index and is not separately stored
/// here; [`Schema::unique_indexes`] synthesises it on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

/// An enum declared in the schema source (§4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, Option<String>)>, // (value, optional @map)
}

/// One model/entity (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub table_name: Option<String>,
    pub fields: Vec<Field>,
    pub relations: IndexMap<String, Relation>,
    pub indexes: Vec<Index>,
    pub composite_key: Option<Vec<String>>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: Vec::new(),
            relations: IndexMap::new(),
            indexes: Vec::new(),
            composite_key: None,
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.field_name.clone(), relation);
        self
    }

    pub fn add_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_composite_key(mut self, fields: Vec<String>) -> Self {
        self.composite_key = Some(fields);
        self
    }

    /// The table this model maps to: `table_name` if set, otherwise
    /// `ModelNameToTableName(name)`.
    pub fn resolved_table_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| model_name_to_table_name(&self.name))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn single_primary_key_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.primary_key)
    }

    pub fn primary_key_fields(&self) -> Vec<&Field> {
        if let Some(composite) = &self.composite_key {
            composite
                .iter()
                .filter_map(|name| self.field(name))
                .collect()
        } else {
            self.single_primary_key_field().into_iter().collect()
        }
    }

    pub fn get_column_name_by_field_name(&self, field_name: &str) -> Option<String> {
        self.field(field_name).map(|f| f.column_name())
    }

    pub fn get_field_name_by_column_name(&self, column_name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.column_name() == column_name)
            .map(|f| f.name.clone())
    }

    /// Maps every field name in `data` to its column name, dropping any key
    /// that isn't a known field.
    pub fn map_field_names_to_columns(
        &self,
        data: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        data.iter()
            .filter_map(|(field, value)| {
                self.get_column_name_by_field_name(field)
                    .map(|col| (col, value.clone()))
            })
            .collect()
    }

    /// Maps a row keyed by column name back to one keyed by field name,
    /// dropping any column that isn't mapped to a field.
    pub fn map_column_data_to_schema(
        &self,
        row: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        row.iter()
            .filter_map(|(column, value)| {
                self.get_field_name_by_column_name(column)
                    .map(|field| (field, value.clone()))
            })
            .collect()
    }

    /// Field-level `Unique: true` fields expressed as synthetic single-column
    /// unique indexes, for drivers that want a uniform index list.
    pub fn unique_indexes(&self) -> Vec<Index> {
        self.fields
            .iter()
            .filter(|f| f.unique && !f.primary_key)
            .map(|f| Index {
                name: format!("{}_{}_key", self.resolved_table_name(), f.column_name()),
                fields: vec![f.name.clone()],
                unique: true,
            })
            .collect()
    }

    /// Validates the invariants of §3/§4.1. Returns the first violation
    /// found; callers needing every violation should call repeatedly after
    /// fixing the reported issue, matching how `RegisterSchema` rejects on
    /// the first error (§7: "never partial-register").
    pub fn validate(&self) -> SchemaResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.resolved_table_name().trim().is_empty() {
            return Err(SchemaError::EmptyTableName(self.name.clone()));
        }
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields(self.name.clone()));
        }

        let single_pks: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.clone())
            .collect();

        if single_pks.len() > 1 {
            return Err(SchemaError::MultiplePrimaryKeys(self.name.clone(), single_pks));
        }
        if !single_pks.is_empty() && self.composite_key.is_some() {
            return Err(SchemaError::BothSingleAndCompositePrimaryKey(self.name.clone()));
        }
        if let Some(composite) = &self.composite_key {
            for field_name in composite {
                if self.field(field_name).is_none() {
                    return Err(SchemaError::UnknownCompositeKeyField(
                        self.name.clone(),
                        field_name.clone(),
                    ));
                }
            }
        }
        if single_pks.is_empty() && self.composite_key.is_none() {
            return Err(SchemaError::NoPrimaryKey(self.name.clone()));
        }

        let mut seen_columns: HashMap<String, String> = HashMap::new();
        for field in &self.fields {
            let column = field.column_name();
            if let Some(existing) = seen_columns.insert(column.clone(), field.name.clone()) {
                if existing != field.name {
                    return Err(SchemaError::ColumnNameCollision(
                        self.name.clone(),
                        existing,
                        field.name.clone(),
                        column,
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> Schema {
        Schema::new("User")
            .add_field({
                let mut f = Field::new("id", FieldType::Int);
                f.primary_key = true;
                f.auto_increment = true;
                f
            })
            .add_field(Field::new("email", FieldType::String))
    }

    #[test]
    fn validate_rejects_empty_name() {
        let s = Schema::new("");
        assert_eq!(s.validate(), Err(SchemaError::EmptyName));
    }

    #[test]
    fn validate_rejects_no_fields() {
        let s = Schema::new("User");
        assert_eq!(s.validate(), Err(SchemaError::NoFields("User".into())));
    }

    #[test]
    fn validate_rejects_no_primary_key() {
        let s = Schema::new("User").add_field(Field::new("email", FieldType::String));
        assert_eq!(s.validate(), Err(SchemaError::NoPrimaryKey("User".into())));
    }

    #[test]
    fn validate_rejects_multiple_single_primary_keys() {
        let s = Schema::new("User")
            .add_field({
                let mut f = Field::new("id", FieldType::Int);
                f.primary_key = true;
                f
            })
            .add_field({
                let mut f = Field::new("uuid", FieldType::String);
                f.primary_key = true;
                f
            });
        assert!(matches!(s.validate(), Err(SchemaError::MultiplePrimaryKeys(_, _))));
    }

    #[test]
    fn validate_rejects_both_single_and_composite_key() {
        let s = Schema::new("User")
            .add_field({
                let mut f = Field::new("id", FieldType::Int);
                f.primary_key = true;
                f
            })
            .add_field(Field::new("tenant", FieldType::String))
            .with_composite_key(vec!["id".into(), "tenant".into()]);
        assert!(matches!(
            s.validate(),
            Err(SchemaError::BothSingleAndCompositePrimaryKey(_))
        ));
    }

    #[test]
    fn validate_rejects_unknown_composite_key_field() {
        let s = Schema::new("User")
            .add_field(Field::new("tenant", FieldType::String))
            .with_composite_key(vec!["tenant".into(), "missing".into()]);
        assert!(matches!(
            s.validate(),
            Err(SchemaError::UnknownCompositeKeyField(_, _))
        ));
    }

    #[test]
    fn validate_accepts_well_formed_schema() {
        assert!(user_schema().validate().is_ok());
    }

    #[test]
    fn column_name_defaults_to_snake_case() {
        let s = Schema::new("User").add_field(Field::new("firstName", FieldType::String));
        assert_eq!(
            s.get_column_name_by_field_name("firstName"),
            Some("first_name".to_string())
        );
        assert_eq!(
            s.get_field_name_by_column_name("first_name"),
            Some("firstName".to_string())
        );
    }

    #[test]
    fn column_name_honours_map_override() {
        let mut field = Field::new("firstName", FieldType::String);
        field.map = Some("fname".into());
        let s = Schema::new("User").add_field(field);
        assert_eq!(s.get_column_name_by_field_name("firstName"), Some("fname".to_string()));
    }

    #[test]
    fn resolved_table_name_defaults_to_pluralised_snake_case() {
        let s = Schema::new("Category").add_field(Field::new("id", FieldType::Int));
        assert_eq!(s.resolved_table_name(), "categories");
    }

    #[test]
    fn resolved_table_name_honours_map() {
        let s = Schema::new("Category")
            .with_table_name("cats")
            .add_field(Field::new("id", FieldType::Int));
        assert_eq!(s.resolved_table_name(), "cats");
    }
}

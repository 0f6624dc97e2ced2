//! Name-mapping rules shared by the parser, the converter, and `pull` (§3, §4.7).

use convert_case::{Case, Casing};

/// `ModelNameToTableName("Category") = "categories"` (§3): pluralise the
/// snake_case form of the model name. Trailing "y" with a preceding
/// consonant becomes "ies"; everything else gets a plain "s" appended.
pub fn model_name_to_table_name(model_name: &str) -> String {
    let snake = model_name.to_case(Case::Snake);
    pluralize_snake(&snake)
}

fn pluralize_snake(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        if let Some(before_y) = stem.chars().last() {
            if !is_vowel(before_y) {
                return format!("{stem}ies");
            }
        }
    }
    if word.ends_with('s') || word.ends_with("sh") || word.ends_with("ch") || word.ends_with('x') || word.ends_with('z') {
        return format!("{word}es");
    }
    format!("{word}s")
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Default column name for a field without an explicit `@map`: snake_case
/// of the field name.
pub fn field_name_to_column_name(field_name: &str) -> String {
    field_name.to_case(Case::Snake)
}

/// Inverse of [`field_name_to_column_name`], used by `pull` (§4.7) to
/// reconstruct `firstName` from `first_name`.
pub fn column_name_to_field_name(column_name: &str) -> String {
    column_name.to_case(Case::Camel)
}

/// Model name for a pulled table: PascalCase singular of the table name
/// (§4.7). We only reverse the common pluralisation rules our own
/// `model_name_to_table_name` produces; tables that don't match a known
/// plural are singularised by stripping a trailing "s" if present.
pub fn table_name_to_model_name(table_name: &str) -> String {
    let singular = singularize_snake(table_name);
    singular.to_case(Case::Pascal)
}

fn singularize_snake(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["ses", "shes", "ches", "xes", "zes"] {
        if let Some(stem) = word.strip_suffix(suffix) {
            return format!("{stem}{}", &suffix[..suffix.len() - 2]);
        }
    }
    if let Some(stem) = word.strip_suffix('s') {
        return stem.to_string();
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_category_to_categories() {
        assert_eq!(model_name_to_table_name("Category"), "categories");
    }

    #[test]
    fn pluralizes_plain_nouns_with_s() {
        assert_eq!(model_name_to_table_name("User"), "users");
        assert_eq!(model_name_to_table_name("Post"), "posts");
    }

    #[test]
    fn pluralizes_words_ending_in_vowel_y() {
        assert_eq!(model_name_to_table_name("Toy"), "toys");
    }

    #[test]
    fn pluralizes_sibilant_endings_with_es() {
        assert_eq!(model_name_to_table_name("Box"), "boxes");
    }

    #[test]
    fn field_to_column_is_snake_case() {
        assert_eq!(field_name_to_column_name("firstName"), "first_name");
    }

    #[test]
    fn column_to_field_round_trips_snake_case_columns() {
        assert_eq!(column_name_to_field_name("first_name"), "firstName");
        assert_eq!(field_name_to_column_name(&column_name_to_field_name("first_name")), "first_name");
    }

    #[test]
    fn table_to_model_singularizes_and_pascal_cases() {
        assert_eq!(table_name_to_model_name("categories"), "Category");
        assert_eq!(table_name_to_model_name("users"), "User");
    }
}

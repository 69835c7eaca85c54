//! Represents a pet record and the client-supplied draft it is created from.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, types::Json};

/// A single animal as stored and returned by id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Animal {
    /// Store-assigned identifier (lowercase hyphenated UUID). Never reused.
    pub id: String,

    /// Species or category, free-form.
    #[serde(rename = "type")]
    pub kind: String,

    pub name: String,

    /// Unix seconds; zero when unknown.
    pub birthday: i64,

    /// Ordered user ids. Duplicates are kept as given.
    pub owners: Vec<String>,

    /// Client-provided URL, usually one returned by the image upload endpoint.
    pub image_url: String,

    /// Unix seconds, stamped once by the service when the record is created.
    pub created_at: i64,
}

/// The fields a client may set when creating an animal.
///
/// Every field is optional on the wire; missing or `null` values fall back
/// to their zero value.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AnimalDraft {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub birthday: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub owners: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub image_url: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A record ready to be handed to the repository: a draft plus its
/// creation timestamp. The repository persists it verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAnimal {
    pub draft: AnimalDraft,
    pub created_at: i64,
}

/// Row shape of the `animals` table. `owners` is a JSON array column.
#[derive(FromRow, Debug)]
pub(crate) struct AnimalRow {
    pub id: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub name: String,
    pub birthday: i64,
    pub owners: Json<Vec<String>>,
    pub image_url: String,
    pub created_at: i64,
}

impl From<AnimalRow> for Animal {
    fn from(row: AnimalRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            name: row.name,
            birthday: row.birthday,
            owners: row.owners.0,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_accepts_partial_json() {
        let draft: AnimalDraft =
            serde_json::from_str(r#"{"type":"dog","name":"Rex"}"#).unwrap();
        assert_eq!(draft.kind, "dog");
        assert_eq!(draft.name, "Rex");
        assert_eq!(draft.birthday, 0);
        assert!(draft.owners.is_empty());
        assert!(draft.image_url.is_empty());
    }

    #[test]
    fn draft_treats_null_as_zero_value() {
        let draft: AnimalDraft = serde_json::from_str(
            r#"{"type":null,"name":"Rex","birthday":null,"owners":null,"image_url":null}"#,
        )
        .unwrap();
        assert_eq!(draft.kind, "");
        assert_eq!(draft.name, "Rex");
        assert_eq!(draft.birthday, 0);
        assert!(draft.owners.is_empty());
        assert!(draft.image_url.is_empty());
    }

    #[test]
    fn animal_serializes_type_field() {
        let animal = Animal {
            id: "id-1".into(),
            kind: "cat".into(),
            name: String::new(),
            birthday: 0,
            owners: vec!["u1".into(), "u1".into()],
            image_url: String::new(),
            created_at: 42,
        };

        let value = serde_json::to_value(&animal).unwrap();
        assert_eq!(value["type"], "cat");
        assert_eq!(value["owners"], serde_json::json!(["u1", "u1"]));
        assert_eq!(value["created_at"], 42);
        assert!(value.get("kind").is_none());
    }
}

//! Vault item model as emitted by `bw list items`.
//!
//! Only the parts the key loader reads are modelled; unknown keys are ignored.
//! Secret-bearing values are zeroized when the item is dropped.

use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

use bwkeys_common::{AttachmentId, ItemId};

/// Custom field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Plain text field.
    Text,
    /// Hidden (masked) text field.
    Hidden,
    /// Checkbox.
    Boolean,
    /// Field linked to another item property.
    Linked,
    /// Any type this tool does not know about.
    Other(u8),
}

impl From<u8> for FieldType {
    fn from(value: u8) -> Self {
        match value {
            0 => FieldType::Text,
            1 => FieldType::Hidden,
            2 => FieldType::Boolean,
            3 => FieldType::Linked,
            other => FieldType::Other(other),
        }
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(FieldType::from)
    }
}

impl FieldType {
    /// Whether the field carries free-form text.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Hidden)
    }
}

/// A custom field on an item.
#[derive(Clone, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub kind: FieldType,
}

impl Drop for Field {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Login section of an item.
#[derive(Clone, Default, Deserialize)]
pub struct Login {
    #[serde(default)]
    pub password: Option<String>,
}

impl Drop for Login {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login").finish_non_exhaustive()
    }
}

/// File attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// A vault item.
#[derive(Clone, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub login: Option<Login>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attachments: Vec<Attachment>,
}

impl Item {
    /// First textual custom field with the given name.
    ///
    /// Fields are searched in stored order; later duplicates are ignored.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.kind.is_textual())
            .find(|f| f.name.as_deref() == Some(name))
            .and_then(|f| f.value.as_deref())
    }

    /// The login password, if the item has one.
    pub fn login_password(&self) -> Option<&str> {
        self.login.as_ref().and_then(|l| l.password.as_deref())
    }

    /// First attachment whose stored file name equals `file_name`.
    pub fn attachment(&self, file_name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.file_name == file_name)
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        self.notes.zeroize();
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("attachments", &self.attachments)
            .finish_non_exhaustive()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

//! The contact entity and its document codec.
//!
//! A [`Contact`] is stored as one document whose field map uses the camelCase
//! keys listed in [`fields`]. The document identifier is not part of the field
//! map; it is assigned by the store and carried alongside.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::photo::EncodedPhoto;
use crate::store::{FieldMap, RawDocument};

/// Document field keys, exact for wire compatibility.
pub mod fields {
    /// Given name.
    pub const FIRST_NAME: &str = "firstName";
    /// Family name.
    pub const LAST_NAME: &str = "lastName";
    /// Phone number, stored as typed.
    pub const PHONE_NUMBER: &str = "phoneNumber";
    /// Email address.
    pub const EMAIL: &str = "email";
    /// Web address.
    pub const URL: &str = "url";
    /// Postal address.
    pub const ADDRESS: &str = "address";
    /// Free-form notes.
    pub const NOTES: &str = "notes";
    /// Birthday as an ISO-8601 date.
    pub const BIRTHDAY: &str = "birthday";
    /// Base64 JPEG photo.
    pub const PHOTO: &str = "photoBase64";
    /// Favorite flag as written by the entity.
    pub const FAVORITE: &str = "favorite";
    /// Block flag, the only field ever patched on its own.
    pub const BLOCKED: &str = "blocked";
    /// Creation timestamp.
    pub const CREATED_AT: &str = "createdAt";
    /// Last update timestamp.
    pub const UPDATED_AT: &str = "updatedAt";

    /// Key used by the favorites-only query.
    ///
    /// This is not the key the entity writes its favorite flag under
    /// ([`FAVORITE`]); both names are part of the stored data contract.
    pub const FAVORITES_QUERY: &str = "isFavorite";
}

/// A single address-book entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    /// Store-assigned identifier, empty until persisted.
    #[serde(skip)]
    pub id: String,

    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Phone number exactly as entered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Web address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Postal address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Date of birth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,

    /// Encoded photo blob.
    #[serde(rename = "photoBase64", skip_serializing_if = "Option::is_none")]
    pub photo: Option<EncodedPhoto>,

    /// Pinned to the highlights section.
    pub favorite: bool,

    /// Calls and messages from this contact are blocked.
    pub blocked: bool,

    /// When the contact was first written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the contact was last written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Create an unsaved contact with the given names.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: non_empty(first_name.into()),
            last_name: non_empty(last_name.into()),
            ..Self::default()
        }
    }

    /// Decode a stored document into a contact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a field has the wrong shape.
    pub fn from_document(doc: &RawDocument) -> Result<Self> {
        let value = serde_json::Value::Object(doc.fields.clone());
        let mut contact: Self =
            serde_json::from_value(value).map_err(|e| Error::decode(&doc.id, e.to_string()))?;
        contact.id.clone_from(&doc.id);
        Ok(contact)
    }

    /// Encode this contact into a document field map.
    ///
    /// The identifier is not included.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_fields(&self) -> Result<FieldMap> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(Error::internal(format!(
                "contact serialized to non-object: {other}"
            ))),
        }
    }

    /// First and last name joined by a space, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        format!("{first} {last}").trim().to_string()
    }

    /// Uppercased first letters of the first and last name, as stored.
    #[must_use]
    pub fn initials(&self) -> String {
        [&self.first_name, &self.last_name]
            .into_iter()
            .filter_map(|name| name.as_deref().and_then(|n| n.chars().next()))
            .map(upper_initial)
            .collect()
    }

    /// A serializable view of this contact that includes its id.
    #[must_use]
    pub fn record(&self) -> ContactRecord<'_> {
        ContactRecord {
            id: &self.id,
            contact: self,
        }
    }

    /// Whether this contact has been persisted.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// Whether a non-empty photo is attached.
    #[must_use]
    pub fn has_photo(&self) -> bool {
        self.photo.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Trim every text field, dropping the ones left empty.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.phone_number,
            &mut self.email,
            &mut self.url,
            &mut self.address,
            &mut self.notes,
        ] {
            *field = field.take().and_then(|v| non_empty(v.trim().to_string()));
        }
    }

    /// Check that the contact can be saved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if both name fields are blank.
    pub fn validate(&self) -> Result<()> {
        let blank = |name: &Option<String>| name.as_deref().map_or(true, |n| n.trim().is_empty());
        if blank(&self.first_name) && blank(&self.last_name) {
            return Err(Error::validation("a first or last name is required"));
        }
        Ok(())
    }
}

/// A contact together with its id, for output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ContactRecord<'a> {
    /// Store-assigned identifier.
    pub id: &'a str,
    /// The contact's fields.
    #[serde(flatten)]
    pub contact: &'a Contact,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Uppercase form of a leading character, kept as-is when uppercasing would
/// expand it to more than one character.
pub(crate) fn upper_initial(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

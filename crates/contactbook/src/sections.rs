//! Turns a filtered contact list into the flat, sectioned display sequence.
//!
//! Favorites come first under a single highlights header. The remaining
//! contacts are grouped under one header per uppercased initial letter.
//! Non-favorites with an empty full name are left out of the display.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::contact::{upper_initial, Contact};

/// Default label of the favorites section.
pub const HIGHLIGHTS_HEADER: &str = "HIGHLIGHTS";

/// One row of the contact list display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DisplayItem {
    /// A section header.
    Header(String),
    /// A contact row.
    Entry(#[serde(serialize_with = "serialize_entry")] Arc<Contact>),
}

fn serialize_entry<S: Serializer>(contact: &Arc<Contact>, serializer: S) -> Result<S::Ok, S::Error> {
    contact.record().serialize(serializer)
}

impl DisplayItem {
    /// The header label, if this is a header.
    #[must_use]
    pub fn header(&self) -> Option<&str> {
        match self {
            Self::Header(label) => Some(label),
            Self::Entry(_) => None,
        }
    }

    /// The contact, if this is an entry.
    #[must_use]
    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Self::Header(_) => None,
            Self::Entry(contact) => Some(contact),
        }
    }
}

/// Builds display sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBuilder {
    favorites_header: String,
}

impl Default for SectionBuilder {
    fn default() -> Self {
        Self::new(HIGHLIGHTS_HEADER)
    }
}

impl SectionBuilder {
    /// Create a builder with a custom favorites header label.
    #[must_use]
    pub fn new(favorites_header: impl Into<String>) -> Self {
        Self {
            favorites_header: favorites_header.into(),
        }
    }

    /// The favorites header label.
    #[must_use]
    pub fn favorites_header(&self) -> &str {
        &self.favorites_header
    }

    /// Build the display sequence for an already sorted and filtered list.
    #[must_use]
    pub fn build(&self, filtered: &[Arc<Contact>]) -> Vec<DisplayItem> {
        let (favorites, others): (Vec<_>, Vec<_>) =
            filtered.iter().partition(|contact| contact.favorite);

        let mut items = Vec::with_capacity(filtered.len() + 2);

        if !favorites.is_empty() {
            items.push(DisplayItem::Header(self.favorites_header.clone()));
            items.extend(favorites.into_iter().cloned().map(DisplayItem::Entry));
        }

        let mut current: Option<String> = None;
        for contact in others {
            let Some(letter) = section_letter(&contact.full_name()) else {
                continue;
            };
            if current.as_deref() != Some(letter.as_str()) {
                items.push(DisplayItem::Header(letter.clone()));
                current = Some(letter);
            }
            items.push(DisplayItem::Entry(Arc::clone(contact)));
        }

        items
    }
}

/// Build with the default highlights header.
#[must_use]
pub fn build_sections(filtered: &[Arc<Contact>]) -> Vec<DisplayItem> {
    SectionBuilder::default().build(filtered)
}

/// Uppercased first character of a name, `None` for an empty name.
///
/// Characters whose uppercase form is longer than one character (`ß`, `ﬁ`)
/// are kept as they are so a header is always a single character.
fn section_letter(name: &str) -> Option<String> {
    name.chars().next().map(|c| upper_initial(c).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, first: &str, favorite: bool) -> Arc<Contact> {
        let mut c = Contact::new(first, "");
        c.id = id.to_string();
        c.favorite = favorite;
        Arc::new(c)
    }

    fn render(items: &[DisplayItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                DisplayItem::Header(label) => format!("#{label}"),
                DisplayItem::Entry(c) => c.full_name(),
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(build_sections(&[]).is_empty());
    }

    #[test]
    fn test_reference_layout() {
        let items = build_sections(&[
            contact("1", "Amy", true),
            contact("2", "bob", false),
            contact("3", "Carl", false),
        ]);

        assert_eq!(
            items,
            vec![
                DisplayItem::Header("HIGHLIGHTS".to_string()),
                DisplayItem::Entry(contact("1", "Amy", true)),
                DisplayItem::Header("B".to_string()),
                DisplayItem::Entry(contact("2", "bob", false)),
                DisplayItem::Header("C".to_string()),
                DisplayItem::Entry(contact("3", "Carl", false)),
            ]
        );
    }

    #[test]
    fn test_one_header_per_letter_run() {
        let items = build_sections(&[
            contact("1", "adam", false),
            contact("2", "Alex", false),
            contact("3", "ben", false),
        ]);
        assert_eq!(render(&items), vec!["#A", "adam", "Alex", "#B", "ben"]);
    }

    #[test]
    fn test_only_favorites() {
        let items = build_sections(&[contact("1", "Zed", true), contact("2", "Amy", true)]);
        assert_eq!(render(&items), vec!["#HIGHLIGHTS", "Zed", "Amy"]);
    }

    #[test]
    fn test_favorites_are_partitioned_stably() {
        let items = build_sections(&[
            contact("1", "bob", false),
            contact("2", "Zed", true),
            contact("3", "cy", false),
            contact("4", "Amy", true),
        ]);
        assert_eq!(
            render(&items),
            vec!["#HIGHLIGHTS", "Zed", "Amy", "#B", "bob", "#C", "cy"]
        );
    }

    #[test]
    fn test_nameless_contact_is_skipped_without_header() {
        let items = build_sections(&[
            contact("1", "bob", false),
            contact("2", "", false),
            contact("3", "Bill", false),
        ]);
        assert_eq!(render(&items), vec!["#B", "bob", "Bill"]);
        assert!(!items
            .iter()
            .any(|i| i.contact().is_some_and(|c| c.id == "2")));
    }

    #[test]
    fn test_only_nameless_contacts_produce_nothing() {
        assert!(build_sections(&[contact("1", "", false)]).is_empty());
    }

    #[test]
    fn test_nameless_favorite_is_still_listed() {
        let items = build_sections(&[contact("1", "", true)]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].header(), Some("HIGHLIGHTS"));
    }

    #[test]
    fn test_non_letter_initials_get_their_own_header() {
        let items = build_sections(&[contact("1", "42 Club", false), contact("2", "éva", false)]);
        assert_eq!(render(&items), vec!["#4", "42 Club", "#É", "éva"]);
    }

    #[test]
    fn test_header_is_always_one_character() {
        let items = build_sections(&[
            contact("1", "ßander", false),
            contact("2", "ﬁnn", false),
            contact("3", "ſam", false),
        ]);
        assert_eq!(render(&items), vec!["#ß", "ßander", "#ﬁ", "ﬁnn", "#S", "ſam"]);
        for label in items.iter().filter_map(DisplayItem::header) {
            assert_eq!(label.chars().count(), 1, "{label:?}");
        }
    }

    #[test]
    fn test_custom_favorites_header() {
        let builder = SectionBuilder::new("FAVORITES");
        let items = builder.build(&[contact("1", "Amy", true)]);
        assert_eq!(items[0].header(), Some("FAVORITES"));
        assert_eq!(builder.favorites_header(), "FAVORITES");
    }

    #[test]
    fn test_entries_serialize_with_id() {
        let items = build_sections(&[contact("c1", "bob", false)]);
        let value = serde_json::to_value(&items).unwrap();

        assert_eq!(value[0], serde_json::json!({"kind": "header", "value": "B"}));
        assert_eq!(value[1]["kind"], "entry");
        assert_eq!(value[1]["value"]["id"], "c1");
        assert_eq!(value[1]["value"]["firstName"], "bob");
    }

    #[test]
    fn test_deterministic() {
        let input = vec![
            contact("1", "Amy", true),
            contact("2", "bob", false),
            contact("3", "", false),
        ];
        let a = serde_json::to_string(&build_sections(&input)).unwrap();
        let b = serde_json::to_string(&build_sections(&input)).unwrap();
        assert_eq!(a, b);
    }
}

//! Case-insensitive substring search over list views.

use crate::records::{AccountRecord, IdentityRecord, SupersededIdentity};
use std::borrow::Cow;

/// A record that list views can search.
pub trait Searchable {
    /// The fields a query is matched against.
    fn search_fields(&self) -> Vec<Cow<'_, str>>;
}

/// Whether any search field contains `query`, ignoring case. The empty
/// query matches everything.
pub fn matches<T: Searchable + ?Sized>(item: &T, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Filter `items` by `query`, keeping input order. `items` is untouched.
pub fn filter<T: Searchable + Clone>(items: &[T], query: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| matches(*item, query))
        .cloned()
        .collect()
}

impl Searchable for IdentityRecord {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        let mut fields = vec![
            Cow::Borrowed(self.first_name.as_str()),
            Cow::Borrowed(self.last_name.as_str()),
            Cow::Owned(self.full_name()),
            Cow::Borrowed(self.identity_number.as_str()),
        ];
        fields.extend(self.email.as_deref().map(Cow::Borrowed));
        fields.extend(self.phone.as_deref().map(Cow::Borrowed));
        fields
    }
}

impl Searchable for SupersededIdentity {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.first_name.as_str()),
            Cow::Borrowed(self.last_name.as_str()),
            Cow::Borrowed(self.identity_number.as_str()),
            Cow::Borrowed(self.reason.as_str()),
        ]
    }
}

impl Searchable for AccountRecord {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.email.as_str()),
            Cow::Borrowed(self.phone_number.as_str()),
        ]
    }
}

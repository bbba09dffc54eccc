//! KYC field configuration.
//!
//! The ordered field list decides which values an identity submission must
//! carry. Only fields that are both enabled and required are enforced.

use crate::error::{LedgerError, Result};
use crate::records::NewIdentity;
use crate::types::KycFieldId;
use serde::{Deserialize, Serialize};

/// Input type of a KYC field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycFieldKind {
    #[default]
    Text,
    Email,
    Number,
    Date,
    File,
}

/// One configurable field of the identity form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycField {
    pub id: KycFieldId,
    /// camelCase key, matched against identity fields.
    pub name: String,
    pub label: String,
    pub required: bool,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: KycFieldKind,
}

impl KycField {
    pub fn new(
        id: impl Into<KycFieldId>,
        name: impl Into<String>,
        label: impl Into<String>,
        kind: KycFieldKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            label: label.into(),
            required: true,
            enabled: true,
            kind,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Enforced on identity creation.
    pub fn is_enforced(&self) -> bool {
        self.enabled && self.required
    }
}

/// Which flag `KycSettings::toggle` flips.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycToggle {
    Enabled,
    Required,
}

/// Ordered KYC field list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KycSettings {
    fields: Vec<KycField>,
}

impl KycSettings {
    pub fn new(fields: Vec<KycField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[KycField] {
        &self.fields
    }

    pub fn get(&self, id: &KycFieldId) -> Option<&KycField> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field. It starts enabled and required, labelled from its
    /// camelCase name.
    pub fn add_field(&mut self, name: &str, kind: KycFieldKind) -> Result<&KycField> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::MissingField("name".into()));
        }

        let id = self.next_id();
        self.fields.push(KycField::new(id, name, label_for(name), kind));
        let last = self.fields.len() - 1;
        Ok(&self.fields[last])
    }

    /// Flip one flag on a field.
    pub fn toggle(&mut self, id: &KycFieldId, which: KycToggle) -> Result<&KycField> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| &f.id == id)
            .ok_or_else(|| LedgerError::KycFieldNotFound(id.clone()))?;

        match which {
            KycToggle::Enabled => field.enabled = !field.enabled,
            KycToggle::Required => field.required = !field.required,
        }
        Ok(field)
    }

    /// Move the field at `from` to position `to`.
    pub fn move_field(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.fields.len();
        for index in [from, to] {
            if index >= len {
                return Err(LedgerError::OutOfBounds { index, len });
            }
        }
        let field = self.fields.remove(from);
        self.fields.insert(to, field);
        Ok(())
    }

    /// Fields that are both enabled and required, in order.
    pub fn required_fields(&self) -> impl Iterator<Item = &KycField> {
        self.fields.iter().filter(|f| f.is_enforced())
    }

    /// Names of enforced fields `input` leaves blank.
    pub fn missing_fields(&self, input: &NewIdentity) -> Vec<String> {
        self.required_fields()
            .filter(|f| input.field_value(&f.name).is_none())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Fail with the first missing enforced field.
    pub fn validate(&self, input: &NewIdentity) -> Result<()> {
        match self.missing_fields(input).into_iter().next() {
            Some(name) => Err(LedgerError::MissingField(name)),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> KycFieldId {
        let mut n = self.fields.len() + 1;
        loop {
            let id = KycFieldId::new(format!("field_{n}"));
            if self.get(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }
}

/// `dateOfBirth` -> `Date Of Birth`.
pub fn label_for(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
            continue;
        }
        if c.is_uppercase() {
            label.push(' ');
        }
        label.push(c);
    }
    label
}

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnMap, FieldRole};

/// Canonical matching form: uppercase, letters/digits/whitespace only,
/// whitespace collapsed to single spaces and trimmed.
///
/// Applying it twice yields the same key.
pub fn normalize_key(value: &str) -> String {
    let mut key = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            pending_space = !key.is_empty();
            continue;
        }
        // uppercasing can emit combining marks, so filter after mapping
        for upper in ch.to_uppercase().filter(|c| c.is_alphanumeric()) {
            if pending_space {
                key.push(' ');
                pending_space = false;
            }
            key.push(upper);
        }
    }
    key
}

/// Identifier form of [`normalize_key`] with all whitespace removed, so
/// "kic 001", "KIC-001" and "KIC001" collapse to one key.
pub fn identifier_key(value: &str) -> String {
    normalize_key(value).replace(' ', "")
}

/// Display values of a record, original casing preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl RecordFields {
    pub fn get(&self, role: FieldRole) -> Option<&str> {
        let value = match role {
            FieldRole::Identifier => &self.identifier,
            FieldRole::LocalityName => &self.locality_name,
            FieldRole::LocalityKind => &self.locality_kind,
            FieldRole::Address => &self.address,
            FieldRole::ContactName => &self.contact_name,
            FieldRole::Phone => &self.phone,
            FieldRole::Email => &self.email,
        };
        value.as_deref()
    }

    fn slot(&mut self, role: FieldRole) -> &mut Option<String> {
        match role {
            FieldRole::Identifier => &mut self.identifier,
            FieldRole::LocalityName => &mut self.locality_name,
            FieldRole::LocalityKind => &mut self.locality_kind,
            FieldRole::Address => &mut self.address,
            FieldRole::ContactName => &mut self.contact_name,
            FieldRole::Phone => &mut self.phone,
            FieldRole::Email => &mut self.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    fields: RecordFields,
    #[serde(skip)]
    identifier_key: Option<String>,
    #[serde(skip)]
    locality_key: Option<String>,
}

impl Record {
    /// Builds a record from display values, or `None` when neither the
    /// identifier nor the locality yields a usable key.
    pub fn from_fields(fields: RecordFields) -> Option<Self> {
        let mut cleaned = RecordFields::default();
        for role in [
            FieldRole::Identifier,
            FieldRole::LocalityName,
            FieldRole::LocalityKind,
            FieldRole::Address,
            FieldRole::ContactName,
            FieldRole::Phone,
            FieldRole::Email,
        ] {
            *cleaned.slot(role) = fields
                .get(role)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }

        let id_key = cleaned
            .identifier
            .as_deref()
            .map(identifier_key)
            .filter(|key| !key.is_empty());
        let locality_key = cleaned
            .locality_name
            .as_deref()
            .map(normalize_key)
            .filter(|key| !key.is_empty());
        if id_key.is_none() && locality_key.is_none() {
            return None;
        }
        Some(Record {
            fields: cleaned,
            identifier_key: id_key,
            locality_key,
        })
    }

    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }

    pub fn identifier(&self) -> Option<&str> {
        self.fields.identifier.as_deref()
    }

    pub fn locality_name(&self) -> Option<&str> {
        self.fields.locality_name.as_deref()
    }

    pub fn identifier_key(&self) -> Option<&str> {
        self.identifier_key.as_deref()
    }

    pub fn locality_key(&self) -> Option<&str> {
        self.locality_key.as_deref()
    }
}

/// Reads one raw row through `map`. Cells past the end of a short row count
/// as empty; `None` means the row carries no identifier or locality.
pub fn normalize_row(row: &[String], map: &ColumnMap) -> Option<Record> {
    let mut fields = RecordFields::default();
    for (role, binding) in map.bindings() {
        *fields.slot(role) = row.get(binding.index).cloned();
    }
    Record::from_fields(fields)
}

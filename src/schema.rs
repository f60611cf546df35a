//! Column role inference for loosely structured spreadsheet exports.
//!
//! Source sheets are maintained by hand, so column order and header wording
//! drift between revisions ("Код ВСП", "VSP code", "KIC", ...). This module
//! assigns a [`FieldRole`] to header positions using one declarative keyword
//! table, falling back to a fixed positional layout for roles no header
//! claims.
//!
//! ## Rules
//!
//! - Headers are lower-cased and tested for keyword containment.
//! - Roles are tried in [`ROLE_SCAN_ORDER`]; a header takes the first role it
//!   matches. The order runs from most to least specific so that
//!   "Contact phone" is a phone column rather than a contact name.
//! - The first header matching a role wins it; later matches are ignored.
//! - Unclaimed roles use their natural position when that column exists and
//!   is not already bound to a keyword-matched role.

use std::{collections::BTreeMap, fmt};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RefreshError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Identifier,
    LocalityName,
    LocalityKind,
    Address,
    ContactName,
    Phone,
    Email,
}

pub const ROLE_SCAN_ORDER: [FieldRole; 7] = [
    FieldRole::Email,
    FieldRole::Phone,
    FieldRole::Address,
    FieldRole::LocalityKind,
    FieldRole::LocalityName,
    FieldRole::ContactName,
    FieldRole::Identifier,
];

const DEFAULT_KEYWORDS: &[(FieldRole, &[&str])] = &[
    (FieldRole::Email, &["email", "e-mail", "mail", "почт"]),
    (
        FieldRole::Phone,
        &["phone", "tel", "mobile", "телефон", "тел", "мобильн"],
    ),
    (FieldRole::Address, &["address", "адрес"]),
    (FieldRole::LocalityKind, &["kind", "type", "тип"]),
    (
        FieldRole::LocalityName,
        &[
            "city",
            "town",
            "locality",
            "settlement",
            "village",
            "город",
            "населен",
            "населён",
            "пункт",
            "посел",
        ],
    ),
    (
        FieldRole::ContactName,
        &[
            "name",
            "contact",
            "responsible",
            "фио",
            "имя",
            "ответствен",
            "контакт",
        ],
    ),
    (
        FieldRole::Identifier,
        &[
            "code", "id", "number", "vsp", "kic", "код", "всп", "кик", "номер",
        ],
    ),
];

impl FieldRole {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldRole::Identifier => "identifier",
            FieldRole::LocalityName => "locality_name",
            FieldRole::LocalityKind => "locality_kind",
            FieldRole::Address => "address",
            FieldRole::ContactName => "contact_name",
            FieldRole::Phone => "phone",
            FieldRole::Email => "email",
        }
    }

    /// Column the role occupies in the canonical sheet layout
    /// (code, city, address, name, phone, email).
    pub fn natural_position(self) -> Option<usize> {
        match self {
            FieldRole::Identifier => Some(0),
            FieldRole::LocalityName => Some(1),
            FieldRole::Address => Some(2),
            FieldRole::ContactName => Some(3),
            FieldRole::Phone => Some(4),
            FieldRole::Email => Some(5),
            FieldRole::LocalityKind => None,
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role → keyword list, kept in [`ROLE_SCAN_ORDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<(FieldRole, Vec<String>)>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let entries = DEFAULT_KEYWORDS
            .iter()
            .map(|(role, words)| (*role, words.iter().map(|w| w.to_string()).collect()))
            .collect();
        KeywordTable { entries }
    }
}

impl KeywordTable {
    /// Replaces the keyword list of every role present in `overrides`.
    pub fn with_overrides(mut self, overrides: &BTreeMap<FieldRole, Vec<String>>) -> Self {
        for (role, words) in self.entries.iter_mut() {
            if let Some(replacement) = overrides.get(role) {
                *words = replacement
                    .iter()
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect();
            }
        }
        self
    }

    pub fn keywords(&self, role: FieldRole) -> &[String] {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == role)
            .map(|(_, words)| words.as_slice())
            .unwrap_or(&[])
    }

    pub fn role_for_header(&self, header: &str) -> Option<FieldRole> {
        let lowered = header.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, words)| words.iter().any(|word| lowered.contains(word.as_str())))
            .map(|(role, _)| *role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSource {
    Keyword,
    Positional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub index: usize,
    pub source: ColumnSource,
}

/// Role → column index for one dataset snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    bindings: BTreeMap<FieldRole, ColumnBinding>,
}

impl ColumnMap {
    pub fn binding(&self, role: FieldRole) -> Option<ColumnBinding> {
        self.bindings.get(&role).copied()
    }

    pub fn index_of(&self, role: FieldRole) -> Option<usize> {
        self.binding(role).map(|binding| binding.index)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (FieldRole, ColumnBinding)> + '_ {
        self.bindings.iter().map(|(role, binding)| (*role, *binding))
    }

    pub fn max_index(&self) -> Option<usize> {
        self.bindings.values().map(|binding| binding.index).max()
    }

    pub fn is_resolvable(&self) -> bool {
        self.bindings.contains_key(&FieldRole::Identifier)
            || self.bindings.contains_key(&FieldRole::LocalityName)
    }

    pub fn describe(&self, headers: &[String]) -> String {
        self.bindings
            .iter()
            .map(|(role, binding)| {
                let header = headers
                    .get(binding.index)
                    .map(|h| h.trim())
                    .unwrap_or("");
                let how = match binding.source {
                    ColumnSource::Keyword => "keyword",
                    ColumnSource::Positional => "position",
                };
                format!("{role}={} '{header}' ({how})", binding.index)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn infer_column_map(
    headers: &[String],
    table: &KeywordTable,
) -> Result<ColumnMap, RefreshError> {
    let mut bindings: BTreeMap<FieldRole, ColumnBinding> = BTreeMap::new();

    for (index, header) in headers.iter().enumerate() {
        let Some(role) = table.role_for_header(header) else {
            continue;
        };
        if bindings.contains_key(&role) {
            debug!("Header '{header}' at column {index} also matches {role}; keeping first match");
            continue;
        }
        bindings.insert(
            role,
            ColumnBinding {
                index,
                source: ColumnSource::Keyword,
            },
        );
    }

    let claimed: Vec<usize> = bindings.values().map(|binding| binding.index).collect();
    for role in ROLE_SCAN_ORDER {
        if bindings.contains_key(&role) {
            continue;
        }
        if let Some(position) = role.natural_position()
            && position < headers.len()
            && !claimed.contains(&position)
        {
            bindings.insert(
                role,
                ColumnBinding {
                    index: position,
                    source: ColumnSource::Positional,
                },
            );
        }
    }

    let map = ColumnMap { bindings };
    if !map.is_resolvable() {
        return Err(RefreshError::SchemaUnresolved {
            headers: headers.to_vec(),
        });
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn infers_canonical_english_headers() {
        let headers = headers(&["Code", "City", "Address", "Name", "Phone", "Email"]);
        let map = infer_column_map(&headers, &KeywordTable::default()).expect("map");
        assert_eq!(map.index_of(FieldRole::Identifier), Some(0));
        assert_eq!(map.index_of(FieldRole::LocalityName), Some(1));
        assert_eq!(map.index_of(FieldRole::Address), Some(2));
        assert_eq!(map.index_of(FieldRole::ContactName), Some(3));
        assert_eq!(map.index_of(FieldRole::Phone), Some(4));
        assert_eq!(map.index_of(FieldRole::Email), Some(5));
        assert!(
            map.bindings()
                .all(|(_, binding)| binding.source == ColumnSource::Keyword)
        );
    }

    #[test]
    fn infers_reordered_russian_headers() {
        let headers = headers(&[
            "ФИО ответственного",
            "Населённый пункт",
            "Тип населённого пункта",
            "Мобильный телефон",
            "Код ВСП",
        ]);
        let map = infer_column_map(&headers, &KeywordTable::default()).expect("map");
        assert_eq!(map.index_of(FieldRole::ContactName), Some(0));
        assert_eq!(map.index_of(FieldRole::LocalityName), Some(1));
        assert_eq!(map.index_of(FieldRole::LocalityKind), Some(2));
        assert_eq!(map.index_of(FieldRole::Phone), Some(3));
        assert_eq!(map.index_of(FieldRole::Identifier), Some(4));
    }

    #[test]
    fn first_matching_header_wins_role() {
        let headers = headers(&["City", "Phone", "Mobile phone", "Code"]);
        let map = infer_column_map(&headers, &KeywordTable::default()).expect("map");
        assert_eq!(map.index_of(FieldRole::Phone), Some(1));
        assert_eq!(map.index_of(FieldRole::Identifier), Some(3));
    }

    #[test]
    fn unmatched_roles_use_unclaimed_natural_positions() {
        let headers = headers(&["Колонка 1", "Город", "Примечание"]);
        let map = infer_column_map(&headers, &KeywordTable::default()).expect("map");
        assert_eq!(
            map.binding(FieldRole::Identifier),
            Some(ColumnBinding {
                index: 0,
                source: ColumnSource::Positional,
            })
        );
        assert_eq!(map.index_of(FieldRole::LocalityName), Some(1));
        assert_eq!(
            map.binding(FieldRole::Address).map(|b| b.source),
            Some(ColumnSource::Positional)
        );
        assert_eq!(map.index_of(FieldRole::Phone), None);
    }

    #[test]
    fn positional_fallback_never_steals_a_keyword_column() {
        let headers = headers(&["Phone", "Email"]);
        let err = infer_column_map(&headers, &KeywordTable::default())
            .expect_err("no identifier or locality column");
        assert!(matches!(err, RefreshError::SchemaUnresolved { .. }));
    }

    #[test]
    fn empty_header_row_is_unresolved() {
        let err = infer_column_map(&[], &KeywordTable::default()).expect_err("empty headers");
        assert!(err.to_string().contains("No identifier or locality column"));
    }

    #[test]
    fn overrides_replace_role_keywords() {
        let mut overrides = BTreeMap::new();
        overrides.insert(FieldRole::Identifier, vec![" Branch ".to_string()]);
        let table = KeywordTable::default().with_overrides(&overrides);
        assert_eq!(table.keywords(FieldRole::Identifier), ["branch".to_string()]);
        assert_eq!(table.role_for_header("BRANCH"), Some(FieldRole::Identifier));
        assert_eq!(table.role_for_header("Code"), None);
    }
}

// src/contract.rs

//! Read-only view of a contract record as returned by the contract store.

use serde::{Deserialize, Serialize};

/// One row of the contract collection.
///
/// Only the fields the watcher needs are mapped; anything else in the row
/// is ignored by serde.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Contract {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,

    #[serde(default, alias = "solicitation")]
    pub solicitation_number: Option<String>,

    #[serde(default, alias = "national_stock_number", alias = "nsn")]
    pub stock_number: Option<String>,

    #[serde(default, alias = "amsc_code", alias = "code")]
    pub derived_code: Option<String>,

    #[serde(default)]
    pub closed: Option<bool>,
}

impl Contract {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            solicitation_number: None,
            stock_number: None,
            derived_code: None,
            closed: None,
        }
    }

    /// Solicitation identifier, if present and not blank.
    pub fn solicitation(&self) -> Option<&str> {
        non_blank(self.solicitation_number.as_deref())
    }

    /// Stock number, if present and not blank.
    pub fn stock(&self) -> Option<&str> {
        non_blank(self.stock_number.as_deref())
    }

    pub fn has_derived_code(&self) -> bool {
        non_blank(self.derived_code.as_deref()).is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.unwrap_or(false)
    }

    /// A contract can only be dispatched when both identifying fields exist.
    pub fn has_dispatch_params(&self) -> bool {
        self.solicitation().is_some() && self.stock().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Stores commonly use integer primary keys; accept both shapes.
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

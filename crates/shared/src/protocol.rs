use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemId, SyncState};

/// Id field as it appears on the wire. JSON collection servers hand out both
/// numeric and string ids depending on how the row was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Text(String),
    Number(i64),
}

impl RemoteId {
    pub fn into_string(self) -> String {
        match self {
            RemoteId::Text(text) => text,
            RemoteId::Number(number) => number.to_string(),
        }
    }
}

/// Loosely typed item as returned by the remote collection. Every field is
/// optional on the wire; [`RemoteItem::into_item`] is the validation boundary
/// that decides what makes it into application state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteItem {
    #[serde(default)]
    pub id: Option<RemoteId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl RemoteItem {
    /// Coerces a wire entry into a confirmed [`Item`]. Entries without an id
    /// or a name are rejected; a missing or non-finite price is coerced to 0.
    pub fn into_item(self) -> Option<Item> {
        let id = self.id.map(RemoteId::into_string)?;
        if id.is_empty() {
            return None;
        }
        let name = self.name.filter(|name| !name.trim().is_empty())?;
        let price = self.price.filter(|price| price.is_finite()).unwrap_or(0.0);
        Some(Item {
            id: ItemId::new(id),
            name,
            price,
            sync: SyncState::Confirmed,
        })
    }
}

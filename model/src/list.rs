use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt::Display};
use uuid::Uuid;

/// Name recorded for edits made without a username
pub const ANONYMOUS_EDITOR: &str = "Anonym";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Todo,
    Done,
}

impl ItemStatus {
    pub fn toggled(self) -> Self {
        match self {
            ItemStatus::Todo => ItemStatus::Done,
            ItemStatus::Done => ItemStatus::Todo,
        }
    }
}

/// A comment as it was before being overwritten.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct CommentHistoryEntry {
    #[serde(rename = "kommentar")]
    pub comment: String,
    pub username: String,
    /// When the comment was written, which is also when it was last current
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl CommentHistoryEntry {
    pub fn new(comment: String, username: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            comment,
            username,
            timestamp,
        }
    }
}

/// One entry of the shopping list.
///
/// Field names on disk and on the wire keep the German labels of the
/// `einkaufsliste.json` format. Quantity and price are read leniently so a
/// single odd value never makes the whole document unreadable.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct ShoppingItem {
    pub id: String,
    #[serde(rename = "artikel")]
    pub name: String,
    #[serde(
        rename = "anzahl",
        default = "default_quantity",
        deserialize_with = "lenient::quantity"
    )]
    pub quantity: u32,
    #[serde(rename = "preis", default, deserialize_with = "lenient::unit_price")]
    pub unit_price: f64,
    pub status: ItemStatus,
    #[serde(rename = "kommentar", default)]
    pub comment: String,
    #[serde(rename = "kommentarHistory", default)]
    pub comment_history: Vec<CommentHistoryEntry>,
    #[serde(rename = "letzterUser", default = "default_editor")]
    pub last_editor: String,
    #[serde(rename = "updatedAt", with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ShoppingItem {
    fn touch(&mut self, username: Option<&str>, now: DateTime<Utc>) {
        self.last_editor = editor_name(username);
        self.updated_at = now;
    }

    /// Snapshot of the current comment, if it is worth keeping when replaced by `new_comment`
    fn superseded_comment(&self, new_comment: &str) -> Option<CommentHistoryEntry> {
        if self.comment.trim().is_empty() || self.comment == new_comment {
            return None;
        }

        Some(CommentHistoryEntry::new(
            self.comment.clone(),
            self.last_editor.clone(),
            self.updated_at,
        ))
    }
}

/// Input for [`ShoppingList::add_item`]
#[derive(Clone, Debug, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub comment: String,
    pub username: Option<String>,
}

impl NewItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: default_quantity(),
            unit_price: 0.0,
            comment: String::new(),
            username: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity.max(1);
        self
    }

    pub fn with_unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// The whole persisted document, `{"items": [...]}`.
///
/// Items stay in insertion order; nothing here ever re-sorts them. An entry
/// that can't be read as an item is skipped on load instead of failing the
/// whole document.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ShoppingList {
    #[serde(default, deserialize_with = "lenient::items")]
    pub items: Vec<ShoppingItem>,
}

impl ShoppingList {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_item(id).is_some()
    }

    pub fn get_item(&self, id: &str) -> Option<&ShoppingItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn get_item_mut(&mut self, id: &str) -> Result<&mut ShoppingItem, ListError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| ListError::NotFound(id.to_owned()))
    }

    /// Appends a new todo item and returns it
    pub fn add_item(
        &mut self,
        new_item: NewItem,
        now: DateTime<Utc>,
    ) -> Result<&ShoppingItem, ListError> {
        let name = new_item.name.trim();
        if name.is_empty() {
            return Err(ListError::Validation(
                "'artikel' must not be empty".to_owned(),
            ));
        }

        let item = ShoppingItem {
            id: self.fresh_id(),
            name: name.to_owned(),
            quantity: new_item.quantity.max(1),
            unit_price: sanitize_price(new_item.unit_price),
            status: ItemStatus::Todo,
            comment: new_item.comment,
            comment_history: Vec::new(),
            last_editor: editor_name(new_item.username.as_deref()),
            updated_at: now,
        };

        self.items.push(item);
        let index = self.items.len() - 1;
        Ok(&self.items[index])
    }

    /// Flips todo/done. Calling it twice restores the status but keeps the second editor.
    pub fn toggle_item(
        &mut self,
        id: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&ShoppingItem, ListError> {
        let item = self.get_item_mut(id)?;
        item.status = item.status.toggled();
        item.touch(username, now);
        Ok(&*item)
    }

    /// Replaces the comment. Every submission counts as an edit, even an unchanged one.
    pub fn comment_item(
        &mut self,
        id: &str,
        comment: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&ShoppingItem, ListError> {
        let item = self.get_item_mut(id)?;
        if let Some(entry) = item.superseded_comment(comment) {
            item.comment_history.push(entry);
        }
        item.comment = comment.to_owned();
        item.touch(username, now);
        Ok(&*item)
    }

    /// Removes the item with `id`, returning whether anything was removed
    pub fn delete_item(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.contains(&id) {
                return id;
            }
        }
    }
}

/// Trimmed username, or [`ANONYMOUS_EDITOR`] if there is none
pub fn editor_name(username: Option<&str>) -> String {
    match username.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => ANONYMOUS_EDITOR.to_owned(),
    }
}

fn default_quantity() -> u32 {
    1
}

fn default_editor() -> String {
    ANONYMOUS_EDITOR.to_owned()
}

fn sanitize_price(price: f64) -> f64 {
    if price.is_finite() && price > 0.0 {
        price
    } else {
        0.0
    }
}

mod lenient {
    use super::ShoppingItem;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn items<'de, D>(deserializer: D) -> Result<Vec<ShoppingItem>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Value>::deserialize(deserializer)?;

        Ok(entries
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(error) => {
                    warn!("skipping unreadable item at position {}: {}", position, error);
                    None
                }
            })
            .collect())
    }

    pub fn quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(crate::methods::quantity_from_value(Some(&value)))
    }

    pub fn unit_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(crate::methods::unit_price_from_value(Some(&value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// A required field was missing or empty
    Validation(String),
    /// No item has the given id
    NotFound(String),
}

impl Error for ListError {}

impl Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListError::Validation(message) => write!(f, "{}", message),
            ListError::NotFound(id) => write!(f, "item '{}' not found", id),
        }
    }
}

//! Figures and orderings for rendering a list. Nothing here is persisted.

use crate::{CommentHistoryEntry, ItemStatus, ShoppingItem, ShoppingList};

/// `quantity × unit price` of one item
pub fn subtotal(item: &ShoppingItem) -> f64 {
    f64::from(item.quantity) * item.unit_price
}

#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Totals {
    pub overall: f64,
    pub todo: f64,
    pub done: f64,
    pub item_count: usize,
    pub done_count: usize,
}

impl Totals {
    pub fn of(list: &ShoppingList) -> Self {
        list.items.iter().fold(Totals::default(), |mut totals, item| {
            let amount = subtotal(item);
            totals.overall += amount;
            totals.item_count += 1;
            match item.status {
                ItemStatus::Todo => totals.todo += amount,
                ItemStatus::Done => {
                    totals.done += amount;
                    totals.done_count += 1;
                }
            }
            totals
        })
    }
}

/// Todo items first, then done ones, each group in insertion order
pub fn display_order(list: &ShoppingList) -> Vec<&ShoppingItem> {
    let mut items: Vec<_> = list.items.iter().collect();
    items.sort_by_key(|item| item.status);
    items
}

pub fn history_newest_first(
    item: &ShoppingItem,
) -> impl Iterator<Item = &CommentHistoryEntry> + '_ {
    item.comment_history.iter().rev()
}

/// An item as the page renders it: the stored fields plus its subtotal and
/// its history newest first.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    #[serde(flatten)]
    pub item: ShoppingItem,
    pub subtotal: f64,
    pub history_newest_first: Vec<CommentHistoryEntry>,
}

impl ItemView {
    pub fn of(item: &ShoppingItem) -> Self {
        Self {
            subtotal: subtotal(item),
            history_newest_first: history_newest_first(item).cloned().collect(),
            item: item.clone(),
        }
    }
}

/// Totals plus every item in display order
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct Summary {
    #[serde(flatten)]
    pub totals: Totals,
    pub items: Vec<ItemView>,
}

impl Summary {
    pub fn of(list: &ShoppingList) -> Self {
        Self {
            totals: Totals::of(list),
            items: display_order(list).into_iter().map(ItemView::of).collect(),
        }
    }
}

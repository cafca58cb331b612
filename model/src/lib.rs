#![allow(clippy::new_without_default)]

use std::{fmt::Display, str::FromStr};

pub use list::*;
pub use methods::*;

pub mod list;
mod methods;
pub mod summary;
mod timestamp;

#[macro_use]
extern crate log;

mod action_names {
    pub const TOGGLE: &str = "toggle";
    pub const COMMENT: &str = "comment";
}

/// An action on a single item, addressed either by `?action=` or by a path suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Flip the status between todo and done
    Toggle,
    /// Replace the comment, recording the previous one in the history
    Comment,
}

impl FromStr for Action {
    type Err = (); // any failure means the action simply doesn't exist
    fn from_str(s: &str) -> Result<Action, Self::Err> {
        use action_names::*;
        match s {
            TOGGLE => Ok(Action::Toggle),
            COMMENT => Ok(Action::Comment),
            _ => Err(()),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use action_names::*;
        let output = match self {
            Action::Toggle => TOGGLE,
            Action::Comment => COMMENT,
        };
        write!(f, "{}", output)
    }
}

/// A message pushed to every live viewer.
///
/// Serializes as `{"type": "update", "data": {"items": [...]}}`.
#[derive(serde::Serialize, Debug, Clone, Copy)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum LiveMessage<'a> {
    Update(&'a ShoppingList),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_round_trips_through_its_name() {
        for action in [Action::Toggle, Action::Comment] {
            assert_eq!(Action::from_str(&action.to_string()), Ok(action));
        }
        assert_eq!(Action::from_str("rename"), Err(()));
        assert_eq!(Action::from_str("Toggle"), Err(()));
    }

    #[test]
    fn live_message_wraps_the_whole_document() {
        let list = ShoppingList::new();
        let message = serde_json::to_value(LiveMessage::Update(&list)).unwrap();

        assert_eq!(message, json!({ "type": "update", "data": { "items": [] } }));
    }
}

use crate::ShoppingItem;
use serde_json::Value;
use std::{convert::TryFrom, error::Error, fmt::Display};

#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Params {
    pub comment: String,
    pub username: Option<String>,
}

impl Params {
    pub fn new(comment: String, username: Option<String>) -> Self {
        Self { comment, username }
    }
}

impl TryFrom<Value> for Params {
    type Error = InvalidParams;
    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let mut fields = super::object_fields(body).ok_or(InvalidParams::NotAnObject)?;

        Ok(Self::new(
            super::text_from_value(fields.remove("kommentar")).unwrap_or_default(),
            super::text_from_value(fields.remove("username")),
        ))
    }
}

#[derive(Debug)]
pub enum InvalidParams {
    NotAnObject,
}

impl Error for InvalidParams {}

impl Display for InvalidParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            InvalidParams::NotAnObject => "request body must be a JSON object",
        };

        write!(f, "{}", output)
    }
}

#[derive(serde::Serialize, Debug, Clone)]
#[non_exhaustive]
pub struct MethodResult {
    pub success: bool,
    pub item: ShoppingItem,
}

impl MethodResult {
    pub fn new(item: ShoppingItem) -> Self {
        Self {
            success: true,
            item,
        }
    }
}

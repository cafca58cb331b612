use crate::NewItem;
use serde_json::Value;
use std::{convert::TryFrom, error::Error, fmt::Display};

#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Params {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub comment: String,
    pub username: Option<String>,
}

impl Params {
    pub fn new(
        name: String,
        quantity: u32,
        unit_price: f64,
        comment: String,
        username: Option<String>,
    ) -> Self {
        Self {
            name,
            quantity,
            unit_price,
            comment,
            username,
        }
    }
}

impl TryFrom<Value> for Params {
    type Error = InvalidParams;
    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let mut fields = super::object_fields(body).ok_or(InvalidParams::NotAnObject)?;

        let quantity = super::quantity_from_value(fields.get("anzahl"));
        let unit_price = super::unit_price_from_value(fields.get("preis"));

        Ok(Params::new(
            super::text_from_value(fields.remove("artikel")).unwrap_or_default(),
            quantity,
            unit_price,
            super::text_from_value(fields.remove("kommentar")).unwrap_or_default(),
            super::text_from_value(fields.remove("username")),
        ))
    }
}

impl From<Params> for NewItem {
    fn from(params: Params) -> Self {
        NewItem {
            name: params.name,
            quantity: params.quantity,
            unit_price: params.unit_price,
            comment: params.comment,
            username: params.username,
        }
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

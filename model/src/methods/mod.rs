use serde_json::{Map, Value};

pub mod add_item;
pub mod comment_item;
pub mod delete_item;
pub mod toggle_item;

/// Quantity from a request or document value; anything that isn't a positive number is 1
pub fn quantity_from_value(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(quantity) if quantity.is_finite() && quantity >= 1.0 => {
            quantity.trunc().min(f64::from(u32::MAX)) as u32
        }
        _ => 1,
    }
}

/// Unit price from a request or document value; anything that isn't a non-negative number is 0
pub fn unit_price_from_value(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(price) if price.is_finite() && price > 0.0 => price,
        _ => 0.0,
    }
}

/// The fields of a JSON object body, `None` for any other kind of value
fn object_fields(body: Value) -> Option<Map<String, Value>> {
    match body {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

fn text_from_value(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantity_parsing_falls_back_to_one() {
        let cases = vec![
            (json!(3), 3),
            (json!("4"), 4),
            (json!(" 5 "), 5),
            (json!(2.9), 2),
            (json!(0), 1),
            (json!(-2), 1),
            (json!(0.5), 1),
            (json!("viele"), 1),
            (json!(null), 1),
            (json!([2]), 1),
        ];

        for (value, expected) in cases {
            assert_eq!(quantity_from_value(Some(&value)), expected, "{}", value);
        }
        assert_eq!(quantity_from_value(None), 1);
    }

    #[test]
    fn unit_price_parsing_falls_back_to_zero() {
        let cases = vec![
            (json!(1.5), 1.5),
            (json!("2.25"), 2.25),
            (json!("1,99"), 1.99),
            (json!(0), 0.0),
            (json!(-1), 0.0),
            (json!("gratis"), 0.0),
            (json!(true), 0.0),
        ];

        for (value, expected) in cases {
            assert_eq!(unit_price_from_value(Some(&value)), expected, "{}", value);
        }
        assert_eq!(unit_price_from_value(None), 0.0);
    }
}

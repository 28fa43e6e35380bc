use prodgap_common::CoreError;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberInput {
    Number(i64),
    Text(String),
}

/// Accepts numbers given either as JSON numbers or as query-string text.
pub fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberInput::Number(n)) => Ok(Some(n)),
        Some(NumberInput::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberInput::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

/// Accepts `true`/`false` in any case, as JSON booleans or query text.
pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolInput {
        Bool(bool),
        Text(String),
    }

    match Option::<BoolInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolInput::Bool(b)) => Ok(Some(b)),
        Some(BoolInput::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(DeError::custom(format!("invalid boolean: {other}"))),
        },
    }
}

const DEFAULT_PAGE_LIMIT: u64 = 20;
const MAX_PAGE_LIMIT: u64 = 1000;

/// Resolves `limit`: default 20, capped at 1000.
pub fn resolve_limit(limit: Option<i64>) -> Result<usize, CoreError> {
    let limit = match limit {
        Some(l) if l < 0 => return Err(CoreError::validation("limit must not be negative")),
        Some(l) => l as u64,
        None => DEFAULT_PAGE_LIMIT,
    };
    Ok(limit.min(MAX_PAGE_LIMIT) as usize)
}

pub fn resolve_offset(offset: Option<i64>) -> Result<usize, CoreError> {
    match offset {
        Some(o) if o < 0 => Err(CoreError::validation("offset must not be negative")),
        Some(o) => Ok(o as usize),
        None => Ok(0),
    }
}

/// `(limit, offset)` for a listing request.
pub fn resolve_page(
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<(usize, usize), CoreError> {
    Ok((resolve_limit(limit)?, resolve_offset(offset)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(resolve_limit(None).unwrap(), 20);
        assert_eq!(resolve_limit(Some(10)).unwrap(), 10);
        assert_eq!(resolve_limit(Some(0)).unwrap(), 0);
        assert_eq!(resolve_limit(Some(5000)).unwrap(), 1000);
        assert_eq!(resolve_offset(None).unwrap(), 0);
        assert_eq!(resolve_offset(Some(40)).unwrap(), 40);
        assert_eq!(resolve_page(Some(5), Some(10)).unwrap(), (5, 10));
    }

    #[test]
    fn negative_limit_or_offset_is_rejected() {
        assert!(matches!(resolve_limit(Some(-3)), Err(CoreError::Validation(_))));
        assert!(matches!(resolve_offset(Some(-1)), Err(CoreError::Validation(_))));
        assert!(resolve_page(Some(10), Some(-1)).is_err());
    }

    #[derive(Deserialize)]
    struct Params {
        #[serde(default, deserialize_with = "deserialize_optional_i64")]
        limit: Option<i64>,
        #[serde(default, deserialize_with = "deserialize_optional_bool")]
        planned: Option<bool>,
    }

    #[test]
    fn numbers_and_booleans_parse_from_text() {
        let p: Params = serde_json::from_value(serde_json::json!({
            "limit": "15",
            "planned": "TRUE"
        }))
        .unwrap();
        assert_eq!(p.limit, Some(15));
        assert_eq!(p.planned, Some(true));

        let p: Params = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(p.limit, None);
        assert_eq!(p.planned, None);
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// M-Pesa validates request timestamps against East Africa Time (UTC+3, no daylight saving).
const EAT_OFFSET_HOURS: i64 = 3;

/// Formats `now` as the fixed-width `YYYYMMDDHHmmss` timestamp the provider expects in `Timestamp` fields and in the
/// password derivation.
pub fn timestamp(now: DateTime<Utc>) -> String {
    let local = now.naive_utc() + Duration::hours(EAT_OFFSET_HOURS);
    local.format("%Y%m%d%H%M%S").to_string()
}

/// Extracts the human-readable message from an error response body. Daraja errors look like
/// `{"requestId": "...", "errorCode": "404.001.03", "errorMessage": "Invalid Access Token"}`; anything else is
/// returned verbatim.
pub fn provider_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        ["errorMessage", "ResponseDescription", "ResultDesc", "error_description"]
            .iter()
            .find_map(|k| v[*k].as_str())
            .map(|m| match v["errorCode"].as_str() {
                Some(code) => format!("{m} ({code})"),
                None => m.to_string(),
            })
    });
    match message {
        Some(m) => m,
        None if body.trim().is_empty() => "No error message was provided".to_string(),
        None => body.trim().to_string(),
    }
}

/// Daraja is inconsistent about whether codes and counts are JSON strings or numbers (`"expires_in": "3599"`,
/// `"ResultCode": 0` vs `"ResultCode": "0"`). These helpers accept either.
pub fn de_u64_lenient<'de, D>(d: D) -> Result<u64, D::Error>
where D: Deserializer<'de> {
    match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().ok_or_else(|| de::Error::custom(format!("{n} is not a positive integer"))),
        Value::String(s) => s.trim().parse::<u64>().map_err(de::Error::custom),
        v => Err(de::Error::custom(format!("expected an integer, got {v}"))),
    }
}

pub fn de_string_lenient<'de, D>(d: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::default()),
        v => Err(de::Error::custom(format!("expected a string or number, got {v}"))),
    }
}

pub fn de_opt_string_lenient<'de, D>(d: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(v) => Err(de::Error::custom(format!("expected a string or number, got {v}"))),
    }
}

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Returns the first `n` characters of `s` followed by an ellipsis. Used to log opaque tokens without leaking them.
pub fn truncated(s: &str, n: usize) -> String {
    let prefix = s.chars().take(n).collect::<String>();
    if prefix.len() < s.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

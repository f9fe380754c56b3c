use serde_json::Value;

/// Interprets a client-supplied camera id. Anything that is not a
/// non-negative integer (or a string holding one) selects device 0.
pub fn parse_device_id(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|id| u32::try_from(id).ok())
            .unwrap_or(0),
        Value::String(s) => parse_device_id_str(s),
        _ => 0,
    }
}

pub fn parse_device_id_str(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::integer(json!(3), 3)]
    #[case::numeric_string(json!("2"), 2)]
    #[case::padded_string(json!(" 1 "), 1)]
    #[case::word(json!("abc"), 0)]
    #[case::empty_string(json!(""), 0)]
    #[case::negative(json!(-1), 0)]
    #[case::float(json!(2.7), 2)]
    #[case::null(json!(null), 0)]
    #[case::object(json!({"id": 1}), 0)]
    #[case::too_large(json!(u64::MAX), 0)]
    fn test_parse_device_id(#[case] value: Value, #[case] expected: u32) {
        assert_eq!(parse_device_id(&value), expected);
    }
}

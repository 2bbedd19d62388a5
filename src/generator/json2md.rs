use serde_json::Value;

pub fn run(bytes: &[u8]) -> Result<String, String> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON document: {}", e))?;
    let pretty = serde_json::to_string_pretty(&value)
        .map_err(|e| format!("Failed to format JSON: {}", e))?;

    Ok(format!("```json\n{}\n```\n", pretty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_printed_in_fence() {
        let md = run(br#"{"name":"Ana","tags":["a","b"]}"#).unwrap();
        assert!(md.starts_with("```json\n{\n"));
        assert!(md.contains("  \"name\": \"Ana\""));
        assert!(md.ends_with("}\n```\n"));
    }

    #[test]
    fn test_invalid_json_reports_position() {
        let err = run(b"{\"a\": }").unwrap_err();
        assert!(err.starts_with("Invalid JSON document"));
        assert!(err.contains("column"));
    }
}

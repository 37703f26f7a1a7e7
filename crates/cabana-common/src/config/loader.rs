use serde::Deserialize;

/// Deserialize a string and treat the empty string as [`None`].
///
/// Environment variables cannot express the absence of a value, so optional
/// configuration items use the empty string as their "unset" default.
pub fn deserialize_non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

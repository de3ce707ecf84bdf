use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("name must contain at least one non-whitespace character")]
    EmptyName,
}

/// Stable store key for a display name: trimmed, lowercased, whitespace runs
/// collapsed to `_`. Re-enrolling "John Doe" as "john  doe" hits the same key.
pub fn stable_key(name: &str) -> Result<String, IdentityError> {
    let key = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    if key.is_empty() {
        return Err(IdentityError::EmptyName);
    }
    Ok(key)
}

//! Client-side pre-check of operator-entered names.
//!
//! Mirrors the engine's join rule so obviously bad input never costs a round
//! trip. The engine remains the authority.

pub const MIN_NAME_LEN: usize = 2;

/// Returns the trimmed name, or a message describing why it is rejected.
pub fn validate_user_name(raw: &str) -> Result<&str, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Name must not be empty.".to_string());
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(format!("Name must be at least {MIN_NAME_LEN} characters."));
    }

    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let ends_with_letter = name.chars().last().is_some_and(|c| c.is_ascii_alphabetic());
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || matches!(c, ' ' | '-' | '\''));
    if !(starts_with_letter && ends_with_letter && allowed) {
        return Err("Letters only; spaces, hyphens, and apostrophes allowed.".to_string());
    }

    Ok(name)
}

//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name a participant may pick, in characters.
pub const MAX_PARTICIPANT_NAME_CHARS: usize = 64;

/// Validates that a participant name is not blank and fits on a leaderboard row.
///
/// # Examples
///
/// ```ignore
/// validate_participant_name("Ada")   // Ok
/// validate_participant_name("   ")   // Err - blank
/// ```
pub fn validate_participant_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("participant_name_blank");
        err.message = Some("Participant name must not be blank".into());
        return Err(err);
    }

    let chars = trimmed.chars().count();
    if chars > MAX_PARTICIPANT_NAME_CHARS {
        let mut err = ValidationError::new("participant_name_length");
        err.message = Some(
            format!(
                "Participant name must be at most {MAX_PARTICIPANT_NAME_CHARS} characters (got {chars})"
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

//! # Badge Identifier Validation
//!
//! Checks applied to raw scanner output before it reaches the deduplicator.
//!
//! A misread tag or a noisy serial line can hand the pipeline an empty
//! string, control bytes, or kilobytes of junk. Validation rejects those at
//! the door so the tap history and the offline buffer only ever hold
//! plausible credential identifiers.

use crate::error::ValidationError;
use crate::MAX_BADGE_ID_LEN;

/// Validates a raw badge identifier from the scanner.
///
/// ## Rules
/// 1. Non-empty
/// 2. At most [`MAX_BADGE_ID_LEN`] characters
/// 3. ASCII alphanumeric, `-`, or `:` only (hex UIDs with optional
///    byte separators cover every reader format deployed so far)
///
/// ## Returns
/// * `Ok(())` - identifier is plausible
/// * `Err(ValidationError)` - reject and log, never buffer
pub fn validate_badge_id(badge_id: &str) -> Result<(), ValidationError> {
    if badge_id.is_empty() {
        return Err(ValidationError::EmptyBadgeId);
    }

    // Character count, matching what the error message reports.
    let len = badge_id.chars().count();
    if len > MAX_BADGE_ID_LEN {
        return Err(ValidationError::BadgeIdTooLong {
            len,
            max: MAX_BADGE_ID_LEN,
        });
    }

    if let Some(found) = badge_id
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != ':')
    {
        return Err(ValidationError::InvalidCharacter { found });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_hex_uid() {
        assert!(validate_badge_id("04A1B2C3D4E5F6").is_ok());
    }

    #[test]
    fn test_accepts_separated_uid() {
        assert!(validate_badge_id("04:A1:B2:C3").is_ok());
        assert!(validate_badge_id("card-0042").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_badge_id(""), Err(ValidationError::EmptyBadgeId));
    }

    #[test]
    fn test_rejects_overlong() {
        let long = "A".repeat(MAX_BADGE_ID_LEN + 1);
        assert!(matches!(
            validate_badge_id(&long),
            Err(ValidationError::BadgeIdTooLong { .. })
        ));
    }

    #[test]
    fn test_overlong_reports_character_count() {
        // Multi-byte input: the reported length is characters, not bytes.
        let long = "é".repeat(MAX_BADGE_ID_LEN + 1);
        assert_eq!(
            validate_badge_id(&long),
            Err(ValidationError::BadgeIdTooLong {
                len: MAX_BADGE_ID_LEN + 1,
                max: MAX_BADGE_ID_LEN,
            })
        );
    }

    #[test]
    fn test_rejects_control_and_whitespace() {
        assert_eq!(
            validate_badge_id("04A1 B2C3"),
            Err(ValidationError::InvalidCharacter { found: ' ' })
        );
        assert_eq!(
            validate_badge_id("04A1\nB2"),
            Err(ValidationError::InvalidCharacter { found: '\n' })
        );
    }
}

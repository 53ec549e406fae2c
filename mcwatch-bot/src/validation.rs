/// Input validation for player lookups and ranking queries
use thiserror::Error;

/// Most players a single ranking query may return.
pub const MAX_TOP_LIMIT: usize = 100;

/// Longest name accepted for a lookup, in bytes.
///
/// Names come from whatever the server reports in its player sample, which is
/// not limited to Mojang usernames (Bedrock proxies, custom sample lines), so
/// lookups only reject what no tracked record could ever match.
pub const MAX_LOOKUP_NAME_LEN: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max {max} bytes, got {actual})")]
    PlayerNameTooLong { max: usize, actual: usize },

    #[error("Limit must be between 1 and {max} (got {actual})")]
    LimitOutOfRange { max: usize, actual: usize },
}

/// Validates a name used to look up a tracked player
///
/// Rules:
/// - Cannot be empty
/// - At most `MAX_LOOKUP_NAME_LEN` bytes
///
/// Any other string is a legal key; a miss is reported by the lookup itself.
pub fn validate_player_lookup(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    if name.len() > MAX_LOOKUP_NAME_LEN {
        return Err(ValidationError::PlayerNameTooLong {
            max: MAX_LOOKUP_NAME_LEN,
            actual: name.len(),
        });
    }

    Ok(())
}

/// Validates the size of a top-players query
pub fn validate_limit(limit: usize) -> Result<usize, ValidationError> {
    if limit == 0 || limit > MAX_TOP_LIMIT {
        return Err(ValidationError::LimitOutOfRange {
            max: MAX_TOP_LIMIT,
            actual: limit,
        });
    }

    Ok(limit)
}

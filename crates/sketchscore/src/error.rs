//! Engine error taxonomy.
//!
//! Only decode failures cross the API boundary. Feature-matching and geometry
//! degeneracies are absorbed internally: they degrade scores and append
//! diagnostic reasons instead of erroring.

/// Errors surfaced by the scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreError {
    /// Input bytes could not be decoded into a raster image, or the decoded
    /// image was empty.
    Decode(String),
    /// An overlay image could not be PNG-encoded.
    Encode(String),
}

impl std::fmt::Display for ScoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "undecodable image: {}", msg),
            Self::Encode(msg) => write!(f, "overlay encode failed: {}", msg),
        }
    }
}

impl std::error::Error for ScoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_displays_message() {
        let e = ScoreError::Decode("truncated png".into());
        assert_eq!(e.to_string(), "undecodable image: truncated png");
    }
}

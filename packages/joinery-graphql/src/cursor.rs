use crate::{GraphqlError, GraphqlResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Opaque position of an edge within an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn encode(offset: usize) -> Self {
        Self(STANDARD.encode(format!("{CURSOR_PREFIX}{offset}")))
    }

    /// Recover the offset this cursor was encoded from.
    ///
    /// Only the exact form produced by [`Cursor::encode`] is accepted, and
    /// offsets must fit a Postgres `BIGINT`.
    pub fn decode(&self) -> GraphqlResult<usize> {
        let malformed = || GraphqlError::MalformedCursor(self.0.clone());

        let bytes = STANDARD.decode(&self.0).map_err(|_| malformed())?;
        let text = String::from_utf8(bytes).map_err(|_| malformed())?;
        let digits = text.strip_prefix(CURSOR_PREFIX).ok_or_else(malformed)?;

        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        if !canonical {
            return Err(malformed());
        }

        digits
            .parse::<i64>()
            .ok()
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or_else(malformed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

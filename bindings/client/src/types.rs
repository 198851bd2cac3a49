use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Bearer token issued by the login endpoint.
///
/// Opaque. Created once during run setup and shared read-only with every agent for the lifetime
/// of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque entity id.
///
/// The API serves ids as JSON strings in production and some fixtures use plain numbers; both
/// forms are accepted and echoed back exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiId(serde_json::Value);

impl<'de> Deserialize<'de> for ApiId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(_) | serde_json::Value::Number(_) => Ok(Self(value)),
            other => Err(de::Error::custom(format!(
                "expected a string or number id, got {other}"
            ))),
        }
    }
}

impl Serialize for ApiId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for ApiId {
    fn from(id: &str) -> Self {
        Self(serde_json::Value::String(id.to_string()))
    }
}

impl From<u64> for ApiId {
    fn from(id: u64) -> Self {
        Self(serde_json::Value::Number(id.into()))
    }
}

/// Status and defensively-decoded body of one API call.
///
/// A body that fails to decode is `None` rather than an error; the workflow treats malformed
/// bodies as ordinary branch conditions.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: Option<T>,
}

/// Body of a login response: `{"token": "..."}`.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub token: Option<String>,
}

/// One page of the book catalog: `{"data": [{"id": ...}, ...]}`.
///
/// The `data` array defaults to empty when absent, which downstream code treats the same as an
/// empty catalog page.
#[derive(Debug, Deserialize)]
pub struct BooksPage {
    #[serde(default)]
    pub data: Vec<BookSummary>,
}

impl BooksPage {
    /// The id of the first listed book, the one an iteration will try to borrow.
    pub fn first_book_id(&self) -> Option<ApiId> {
        self.data.first().map(|book| book.id.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct BookSummary {
    pub id: ApiId,
}

/// Body of a borrow attempt. `record` is absent when the API refused the borrow, for example
/// because the book was already borrowed or no longer exists.
#[derive(Debug, Deserialize)]
pub struct BorrowBody {
    pub record: Option<BorrowRecord>,
}

impl BorrowBody {
    pub fn record_id(&self) -> Option<ApiId> {
        self.record.as_ref().map(|record| record.id.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct BorrowRecord {
    pub id: ApiId,
}

//! Identity of the origin server a response body is streamed from.

use std::fmt;

/// Identifies the origin an in-flight response was being read from.
///
/// Carried by the response-timeout error so operators can attribute a
/// stranded transfer to a backend.
///
/// # Examples
///
/// ```
/// use flowline::Origin;
///
/// let origin = Origin::new("app-01", "origin.example.net:8080");
/// assert_eq!(origin.to_string(), "app-01/origin.example.net:8080");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    id: String,
    host: String,
}

impl Origin {
    /// Create an origin identity from a logical id and a host address.
    #[must_use]
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
        }
    }

    /// Logical identifier of the origin.
    #[must_use]
    pub fn id(&self) -> &str { &self.id }

    /// Host address of the origin.
    #[must_use]
    pub fn host(&self) -> &str { &self.host }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.host)
    }
}

//! Paths of the model-server endpoints this crate calls.

/// Logical API operation with a fixed URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Text generation.
    Generate,
    /// Embedding generation.
    Embed,
}

impl Endpoint {
    pub const fn path(self) -> &'static str {
        match self {
            Endpoint::Generate => "/api/generate",
            Endpoint::Embed => "/api/embed",
        }
    }
}

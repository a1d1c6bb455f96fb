//! Opaque stable identifiers used across the coordination core.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

opaque_id!(
    /// Identifies one run of the planner/critic loop.
    RunId
);
opaque_id!(
    /// Identifies one dispatched tool call within a run.
    StepId
);
opaque_id!(
    /// Identifies one pending or resolved human approval.
    ApprovalId
);
opaque_id!(
    /// Identifies one binding from a claim to its supporting source.
    CitationId
);

/// The identifier of a configured tool server.
///
/// Unlike the UUID-backed ids above, server ids are operator-chosen names
/// from configuration (`server_id` in `servers.yaml`), so this wraps a
/// `String` rather than generating one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub String);

impl ServerId {
    /// Build a server id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A content hash, produced by the Artefact Store's fixed hash function.
///
/// Rendered as lowercase hex; two `ArtefactId`s are equal iff the
/// underlying bytes were equal, by construction of `blake3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtefactId(pub String);

impl fmt::Display for ArtefactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully-qualified tool name, `<server_id>.<tool_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedToolName {
    /// The server that exposes the tool.
    pub server_id: ServerId,
    /// The tool's name local to that server.
    pub tool_name: String,
}

impl QualifiedToolName {
    /// Parse `"<server_id>.<tool_name>"`.
    ///
    /// Splits on the first `.`, so tool names may themselves contain dots;
    /// server ids may not.
    pub fn parse(raw: &str) -> Option<Self> {
        let (server, tool) = raw.split_once('.')?;
        if server.is_empty() || tool.is_empty() {
            return None;
        }
        Some(Self {
            server_id: ServerId::new(server),
            tool_name: tool.to_string(),
        })
    }
}

impl fmt::Display for QualifiedToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.server_id, self.tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_round_trip() {
        let parsed = QualifiedToolName::parse("search.web_search").unwrap();
        assert_eq!(parsed.server_id.as_str(), "search");
        assert_eq!(parsed.tool_name, "web_search");
        assert_eq!(parsed.to_string(), "search.web_search");
    }

    #[test]
    fn qualified_name_keeps_dots_in_tool() {
        let parsed = QualifiedToolName::parse("fs.read.file").unwrap();
        assert_eq!(parsed.server_id.as_str(), "fs");
        assert_eq!(parsed.tool_name, "read.file");
    }

    #[test]
    fn qualified_name_rejects_unqualified() {
        assert!(QualifiedToolName::parse("ping").is_none());
        assert!(QualifiedToolName::parse(".ping").is_none());
        assert!(QualifiedToolName::parse("server.").is_none());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}

//! Composite identifier used to import an existing route
//!
//! Format: `<serverId>-<routeId>`, split on the first `-`.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A parsed `<serverId>-<routeId>` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportId {
    /// Owning server
    pub server_id: String,
    /// Route on that server
    pub route_id: String,
}

impl ImportId {
    /// Build an import ID from its parts
    pub fn new(server_id: impl Into<String>, route_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            route_id: route_id.into(),
        }
    }
}

impl FromStr for ImportId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((server_id, route_id)) if !server_id.is_empty() && !route_id.is_empty() => {
                Ok(Self::new(server_id, route_id))
            }
            _ => Err(Error::InvalidImportId { id: s.to_string() }),
        }
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.server_id, self.route_id)
    }
}

//! Declarative route model
//!
//! - [`RouteSpec`]: desired configuration of one route
//! - [`RouteChanges`]: the mutable fields an update touches
//! - [`RouteState`]: what is tracked locally after a successful operation
//! - [`plan`]: decides how to move from tracked state to desired configuration
//!
//! `network` and `server_id` cannot be changed in place. Changing either one
//! forces the route to be replaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::traits::{Route, RoutePayload};

/// Desired configuration of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Server to attach the route to (force-new)
    pub server_id: String,

    /// Network address in CIDR notation (force-new)
    pub network: String,

    /// Comment for the route
    #[serde(default)]
    pub comment: Option<String>,

    /// NAT VPN traffic destined to this network
    #[serde(default = "default_nat")]
    pub nat: bool,

    /// Requested gateway flag; `None` leaves it to the server
    #[serde(default)]
    pub net_gateway: Option<bool>,
}

impl RouteSpec {
    /// Create a spec with defaults (`nat` on, no comment, gateway unset)
    pub fn new(server_id: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            network: network.into(),
            comment: None,
            nat: default_nat(),
            net_gateway: None,
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Enable or disable NAT
    pub fn with_nat(mut self, nat: bool) -> Self {
        self.nat = nat;
        self
    }

    /// Request a gateway flag
    pub fn with_net_gateway(mut self, net_gateway: bool) -> Self {
        self.net_gateway = Some(net_gateway);
        self
    }

    /// Check the server ID and network before any remote call
    pub fn validate(&self) -> Result<()> {
        if self.server_id.trim().is_empty() {
            return Err(Error::config("Route server_id cannot be empty"));
        }
        validate_network(&self.network)
    }

    /// Body of the "add route" call for this spec
    pub fn payload(&self) -> RoutePayload {
        RoutePayload {
            network: self.network.clone(),
            comment: normalized(&self.comment).map(str::to_string),
            nat: self.nat,
            net_gateway: self.net_gateway.unwrap_or(false),
        }
    }
}

fn default_nat() -> bool {
    true
}

/// Check that `network` is in CIDR notation (`<address>/<prefix>`)
///
/// Host bits are not required to be zero.
pub fn validate_network(network: &str) -> Result<()> {
    let (addr, prefix) = network
        .split_once('/')
        .ok_or_else(|| Error::invalid_network(network, "missing '/<prefix>'"))?;

    let addr: IpAddr = addr
        .parse()
        .map_err(|_| Error::invalid_network(network, format!("'{}' is not an IP address", addr)))?;

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_network(
            network,
            format!("'{}' is not a prefix length", prefix),
        ));
    }

    let max_prefix: u32 = if addr.is_ipv4() { 32 } else { 128 };
    match prefix.parse::<u32>() {
        Ok(len) if len <= max_prefix => Ok(()),
        _ => Err(Error::invalid_network(
            network,
            format!("prefix length must be at most {}", max_prefix),
        )),
    }
}

/// Mutable route fields to apply in an update
///
/// `None` leaves a field untouched. For `comment`, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteChanges {
    /// New comment
    pub comment: Option<Option<String>>,
    /// New NAT flag
    pub nat: Option<bool>,
    /// New gateway flag
    pub net_gateway: Option<bool>,
}

impl RouteChanges {
    /// Empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the comment (`None` clears it)
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = Some(comment);
        self
    }

    /// Change the NAT flag
    pub fn with_nat(mut self, nat: bool) -> Self {
        self.nat = Some(nat);
        self
    }

    /// Change the gateway flag
    pub fn with_net_gateway(mut self, net_gateway: bool) -> Self {
        self.net_gateway = Some(net_gateway);
        self
    }

    /// True when nothing would change
    pub fn is_empty(&self) -> bool {
        self.comment.is_none() && self.nat.is_none() && self.net_gateway.is_none()
    }

    /// Merge the marked fields into `route`
    pub fn apply_to(&self, route: &mut Route) {
        if let Some(comment) = &self.comment {
            route.comment = normalized(comment).map(str::to_string);
        }
        if let Some(nat) = self.nat {
            route.nat = nat;
        }
        if let Some(net_gateway) = self.net_gateway {
            route.net_gateway = net_gateway;
        }
    }
}

/// Locally tracked state of a managed route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteState {
    /// Store-assigned identifier
    pub id: String,
    /// Owning server
    pub server_id: String,
    /// Network in CIDR notation
    pub network: String,
    /// Comment
    pub comment: Option<String>,
    /// NAT flag
    pub nat: bool,
    /// Gateway flag, as reported by the store
    pub net_gateway: bool,
    /// When these fields were last read from or written to the store
    pub last_refreshed: DateTime<Utc>,
}

impl RouteState {
    /// Snapshot a route returned by the store
    pub fn from_route(route: &Route) -> Self {
        Self {
            id: route.id.clone(),
            server_id: route.server_id.clone(),
            network: route.network.clone(),
            comment: normalized(&route.comment).map(str::to_string),
            nat: route.nat,
            net_gateway: route.net_gateway,
            last_refreshed: Utc::now(),
        }
    }

    /// Check if the state is older than the given duration
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        Utc::now().signed_duration_since(self.last_refreshed) > max_age
    }
}

/// What has to happen to bring a route to its desired configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing tracked yet
    Create,
    /// Mutable fields differ
    Update(RouteChanges),
    /// A force-new field differs; delete then create
    Replace,
    /// Tracked state already matches
    Unchanged,
}

/// Compare tracked state against the desired configuration
pub fn plan(prior: Option<&RouteState>, desired: &RouteSpec) -> Plan {
    let Some(prior) = prior else {
        return Plan::Create;
    };

    if prior.network != desired.network || prior.server_id != desired.server_id {
        return Plan::Replace;
    }

    let mut changes = RouteChanges::new();

    if normalized(&prior.comment) != normalized(&desired.comment) {
        changes.comment = Some(desired.comment.clone());
    }
    if prior.nat != desired.nat {
        changes.nat = Some(desired.nat);
    }
    // computed by the server unless explicitly requested
    if let Some(net_gateway) = desired.net_gateway
        && net_gateway != prior.net_gateway
    {
        changes.net_gateway = Some(net_gateway);
    }

    if changes.is_empty() {
        Plan::Unchanged
    } else {
        Plan::Update(changes)
    }
}

fn normalized(comment: &Option<String>) -> Option<&str> {
    comment.as_deref().filter(|c| !c.is_empty())
}

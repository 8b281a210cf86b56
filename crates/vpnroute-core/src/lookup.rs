//! Route lookup over a server's full route list
//!
//! The route store has no "get route by ID" call, so every operation fetches
//! the whole list for a server and scans it.

use crate::error::{Error, Result};
use crate::traits::Route;

/// Find the route with the given identifier
///
/// Linear scan that stops at the first match. No ordering of `routes` is
/// assumed. An empty `route_id` never matches.
pub fn find_route<'a>(route_id: &str, routes: &'a [Route]) -> Option<&'a Route> {
    if route_id.is_empty() {
        return None;
    }
    routes.iter().find(|route| route.id == route_id)
}

/// Like [`find_route`], but a missing route is an error
pub fn require_route<'a>(server_id: &str, route_id: &str, routes: &'a [Route]) -> Result<&'a Route> {
    find_route(route_id, routes).ok_or_else(|| Error::route_not_found(server_id, route_id))
}

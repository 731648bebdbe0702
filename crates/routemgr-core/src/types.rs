use serde::{Deserialize, Serialize};

use crate::curve::LiquidityCurve;
use crate::error::CoreError;

/// Minimum message window, in seconds, advertised with every route.
pub const MIN_MESSAGE_WINDOW: u64 = 1;

/// The only custom request method the route manager understands.
pub const BROADCAST_ROUTES_METHOD: &str = "broadcast_routes";

/// Returns true if `ledger` lies under `prefix` in the address hierarchy.
pub fn is_under(ledger: &str, prefix: &str) -> bool {
    ledger.starts_with(prefix)
}

/// A route as advertised between connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRoute {
    /// Ledger the advertising connector sits on.
    pub source_ledger: String,
    /// Prefix reachable through the advertiser.
    pub destination_ledger: String,
    /// Account of the advertising connector on `source_ledger`.
    pub source_account: String,
    pub min_message_window: u64,
    /// End-to-end liquidity curve from `source_ledger` to the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<LiquidityCurve>,
    /// Alternate intermediate-hop sequences; a single empty path means direct.
    #[serde(default = "default_paths")]
    pub paths: Vec<Vec<String>>,
}

fn default_paths() -> Vec<Vec<String>> {
    vec![Vec::new()]
}

/// The payload of a `broadcast_routes` request, used in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingUpdate {
    pub new_routes: Vec<MessageRoute>,
    pub unreachable_through_me: Vec<String>,
    /// Hold-down time in milliseconds.
    pub hold_down_time: u64,
    pub request_full_table: bool,
}

impl RoutingUpdate {
    /// Decode and validate an update received as untyped JSON.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let update: RoutingUpdate = serde_json::from_value(value)?;
        update.validate()?;
        Ok(update)
    }

    /// Structural checks beyond what the JSON shape enforces.
    pub fn validate(&self) -> Result<(), CoreError> {
        for prefix in &self.unreachable_through_me {
            validate_prefix("unreachable_through_me", prefix)?;
        }
        for route in &self.new_routes {
            route.validate()?;
        }
        Ok(())
    }
}

impl MessageRoute {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_prefix("source_ledger", &self.source_ledger)?;
        validate_prefix("destination_ledger", &self.destination_ledger)?;
        validate_address("source_account", &self.source_account)?;
        if let Some(points) = &self.points {
            points.validate()?;
        }
        for hop in self.paths.iter().flatten() {
            validate_address("paths", hop)?;
        }
        Ok(())
    }
}

/// A route as pushed to a local shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRoute {
    pub prefix: String,
    /// Host of the shard that payments for `prefix` are forwarded through.
    pub shard: String,
    #[serde(rename = "curveLocal", default, skip_serializing_if = "Option::is_none")]
    pub curve_local: Option<LiquidityCurve>,
    #[serde(rename = "curveRemote", default, skip_serializing_if = "Option::is_none")]
    pub curve_remote: Option<LiquidityCurve>,
    pub local: bool,
}

/// Full table snapshot pushed to a shard's `/internal/routes` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSnapshot {
    pub all: Vec<ShardRoute>,
}

/// Custom request body understood by connector shards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRequest {
    pub method: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Request relayed by a shard from a peer connector to the route manager.
/// Fields are optional so that missing ones are reported, not rejected by
/// the JSON extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingRequest {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub custom: Option<CustomRequest>,
}

fn validate_address(field: &str, address: &str) -> Result<(), CoreError> {
    if address.is_empty() {
        return Err(CoreError::MissingField(field.to_string()));
    }
    let valid = address
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-'));
    if !valid {
        return Err(CoreError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

fn validate_prefix(field: &str, prefix: &str) -> Result<(), CoreError> {
    validate_address(field, prefix)?;
    if !prefix.ends_with('.') {
        return Err(CoreError::ValidationError(format!(
            "{field} must end with '.': {prefix}"
        )));
    }
    Ok(())
}

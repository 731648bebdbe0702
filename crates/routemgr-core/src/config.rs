use serde::{Deserialize, Serialize};

use crate::curve::LiquidityCurve;
use crate::error::CoreError;

/// Static description of one connector shard coordinated by the route manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Ledger prefix owned by the shard.
    pub prefix: String,
    /// Base URL of the shard's internal API.
    pub host: String,
    /// The shard's own account on its ledger.
    pub account: String,
    /// Account of the peer connector on the other side of the ledger.
    #[serde(alias = "peerAccount")]
    pub peer_account: String,
    /// Directly configured routes, seeded as head routes.
    #[serde(default, alias = "initialTable")]
    pub initial_table: Vec<ShardRouteConfig>,
}

/// A configured route from a shard to a destination prefix through another shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRouteConfig {
    /// Destination prefix.
    pub prefix: String,
    /// Host of the shard payments are forwarded through.
    pub shard: String,
    #[serde(default, alias = "curveLocal", skip_serializing_if = "Option::is_none")]
    pub curve_local: Option<LiquidityCurve>,
    #[serde(default)]
    pub local: bool,
}

impl ShardConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: &str| CoreError::ValidationError(format!("invalid shard: {msg}"));
        if self.prefix.is_empty() {
            return Err(invalid("prefix must be a non-empty string"));
        }
        if self.host.is_empty() {
            return Err(invalid("host must be a non-empty string"));
        }
        if self.account.is_empty() {
            return Err(invalid("account must be a non-empty string"));
        }
        if self.peer_account.is_empty() {
            return Err(invalid("peer_account must be a non-empty string"));
        }
        for route in &self.initial_table {
            route.validate()?;
        }
        Ok(())
    }
}

impl ShardRouteConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid =
            |msg: String| CoreError::ValidationError(format!("invalid shard route: {msg}"));
        if self.prefix.is_empty() {
            return Err(invalid("prefix must be a non-empty string".into()));
        }
        if self.shard.is_empty() {
            return Err(invalid("shard must be a non-empty string".into()));
        }
        if let Some(curve) = &self.curve_local {
            curve.validate().map_err(|e| invalid(e.to_string()))?;
        }
        Ok(())
    }
}

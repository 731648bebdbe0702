/// Errors that can occur within the routing layer.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("initial route of shard {shard} names unknown shard host {host}")]
    UnknownShardHost { shard: String, host: String },

    #[error("no route table for shard {0}")]
    UnknownTable(String),

    #[error("duplicate shard prefix: {0}")]
    DuplicateShard(String),
}

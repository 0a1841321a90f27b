use clap::Args;
use url::Url;

#[derive(Debug, Clone, Args)]
pub struct ExplorerCliArgs {
    /// Websocket endpoint run events are mirrored to. Sync is disabled when unset.
    #[arg(env = "ORACLE_NODE_EXPLORER_URL", long)]
    pub explorer_url: Option<Url>,

    #[arg(env = "ORACLE_NODE_EXPLORER_ACCESS_KEY", long, default_value = "")]
    pub explorer_access_key: String,

    #[arg(env = "ORACLE_NODE_EXPLORER_SECRET", long, default_value = "")]
    pub explorer_secret: String,

    /// Interval of the periodic push of undelivered events.
    #[arg(env = "ORACLE_NODE_EXPLORER_PUSH_INTERVAL_SECONDS", long, default_value = "30")]
    pub explorer_push_interval_seconds: u64,
}

mod config;
mod forward;
mod tunnel;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;

#[derive(Debug, Parser)]
#[command(name = "herald-agent")]
#[command(about = "Herald tunnel agent: receives signals over an outbound connection and forwards them to a local endpoint", version)]
struct Args {
    /// Subscriber API key (hld_sub_…).
    #[arg(long, env = "HERALD_AGENT_TOKEN")]
    token: String,

    /// Local URL signals are POSTed to.
    #[arg(long, env = "HERALD_AGENT_FORWARD")]
    forward: String,

    /// Relay tunnel endpoint.
    #[arg(long, env = "HERALD_AGENT_URL", default_value = "wss://api.herald.dev/v1/tunnel")]
    herald_url: String,

    /// Optional bearer token sent on local forwards.
    #[arg(long, env = "HERALD_AGENT_LOCAL_TOKEN")]
    local_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = AgentConfig {
        token: args.token,
        forward_url: args.forward,
        herald_url: args.herald_url,
        local_token: args.local_token,
    };

    tunnel::run_tunnel(config).await
}

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "flare-worker", about = "Flare execution worker")]
pub struct Args {
    #[arg(long, env = "FLARE_WORKER_ADDR", default_value = "0.0.0.0:8787")]
    pub listen_addr: String,

    /// Base URL of the sandbox host that owns the isolated sessions.
    #[arg(long, env = "FLARE_SANDBOX_URL", default_value = "http://127.0.0.1:8939")]
    pub sandbox_url: String,

    /// Shared secret required on /execute and /execute-batch. The worker
    /// refuses to start without one unless --insecure-no-auth is set.
    #[arg(long, env = "FLARE_API_KEY")]
    pub api_key: Option<String>,

    /// Serve without credential checks. Local development only.
    #[arg(long, env = "FLARE_INSECURE_NO_AUTH")]
    pub insecure_no_auth: bool,

    /// OTLP/HTTP trace export endpoint (disabled when unset).
    #[arg(long, env = "FLARE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "FLARE_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}

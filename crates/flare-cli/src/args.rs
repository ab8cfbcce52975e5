use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "flare")]
#[command(about = "Serverless function execution on sandbox sessions", long_about = None)]
#[command(version)]
pub struct Args {
    /// Worker URL (overrides the config file)
    #[arg(long, env = "FLARE_WORKER_URL", global = true)]
    pub worker_url: Option<String>,

    /// API key (overrides the config file)
    #[arg(long, env = "FLARE_API_KEY", global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage flare configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
    /// Execute one function call remotely
    Exec {
        /// Source file containing the function definition
        file: PathBuf,
        /// Name of the function to invoke
        #[arg(long)]
        function: String,
        /// Serialized positional arguments, hex-encoded
        #[arg(long, default_value = "")]
        args_hex: String,
        /// Serialized keyword arguments, hex-encoded
        #[arg(long, default_value = "")]
        kwargs_hex: String,
        /// Execution timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Environment variables injected into the session (KEY=VALUE)
        #[arg(long = "env", value_parser = parse_key_val)]
        env: Vec<(String, String)>,
        /// Show execution details after the run
        #[arg(long)]
        show_execution: bool,
    },
    /// Execute a function once per item, in parallel sessions
    Map {
        /// Source file containing the function definition
        file: PathBuf,
        /// Name of the function to invoke
        #[arg(long)]
        function: String,
        /// Serialized item payload, hex-encoded (repeatable)
        #[arg(long = "item")]
        items: Vec<String>,
        /// Max parallel sessions
        #[arg(long)]
        max_containers: Option<usize>,
        /// Per-item timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Show execution details after the run
        #[arg(long)]
        show_execution: bool,
    },
    /// Check worker health
    Health,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive-free setup: set the URL and generate an API key
    Init {
        #[arg(long, default_value = "http://localhost:8787")]
        url: String,
    },
    /// Show current configuration (key masked)
    Show,
    /// Set the worker URL
    SetUrl { url: String },
    /// Set the API key
    SetKey { api_key: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

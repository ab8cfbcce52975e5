mod args;
mod output;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use flare_client::{decode_results, FlareClient, FlareConfig};
use flare_common::{ExecuteBatchRequest, ExecuteRequest};

use crate::args::{Args, Command, ConfigCommand};
use crate::output::{mask_key, print_batch_execution, print_single_execution};

/// Stable identity for a function version: name plus a short digest of the
/// source, so a redeployed body gets a fresh id.
fn function_id(function_name: &str, code: &str) -> String {
    let digest = hex::encode(Sha256::digest(code.as_bytes()));
    format!("{function_name}_{}", &digest[..8])
}

fn generate_api_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(43)
        .map(char::from)
        .collect();
    format!("sk_{suffix}")
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

/// Resolve worker URL and API key: CLI flag, then env, then `~/.flare/config.json`.
fn resolve_client(args: &Args) -> Result<FlareClient> {
    let cfg = FlareConfig::load()?;
    let worker_url = args
        .worker_url
        .clone()
        .or_else(|| cfg.worker_url())
        .context("no worker URL configured; run 'flare config init' or set FLARE_WORKER_URL")?;
    let api_key = args
        .api_key
        .clone()
        .or_else(|| cfg.api_key())
        .context("no API key configured; run 'flare config init' or set FLARE_API_KEY")?;
    Ok(FlareClient::new(&worker_url, &api_key)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match &args.command {
        Command::Config { subcommand } => match subcommand {
            ConfigCommand::Init { url } => {
                let mut cfg = FlareConfig::load()?;
                cfg.set_worker_url(url.clone());
                let key = generate_api_key();
                cfg.set_api_key(key.clone());
                cfg.save()?;
                println!("✓ Config written to {}", cfg.path().display());
                println!("  worker_url: {url}");
                println!("  api_key:    {key}");
                println!("Set FLARE_API_KEY to the same value on the worker.");
            }
            ConfigCommand::Show => {
                let cfg = FlareConfig::load()?;
                println!("config file: {}", cfg.path().display());
                match cfg.stored_worker_url() {
                    Some(url) => println!("worker_url:  {url}"),
                    None => println!("worker_url:  (unset)"),
                }
                match cfg.stored_api_key() {
                    Some(key) => println!("api_key:     {}", mask_key(key)),
                    None => println!("api_key:     (unset)"),
                }
            }
            ConfigCommand::SetUrl { url } => {
                let mut cfg = FlareConfig::load()?;
                cfg.set_worker_url(url.clone());
                cfg.save()?;
                println!("✓ worker_url set to {url}");
            }
            ConfigCommand::SetKey { api_key } => {
                let mut cfg = FlareConfig::load()?;
                cfg.set_api_key(api_key.clone());
                cfg.save()?;
                println!("✓ api_key updated ({})", mask_key(api_key));
            }
        },
        Command::Exec {
            file,
            function,
            args_hex,
            kwargs_hex,
            timeout,
            env,
            show_execution,
        } => {
            let client = resolve_client(&args)?;
            let code = read_source(file)?;
            let env_map: Option<HashMap<String, String>> = if env.is_empty() {
                None
            } else {
                Some(env.iter().cloned().collect())
            };
            let req = ExecuteRequest {
                function_id: function_id(function, &code),
                code,
                function_name: function.clone(),
                args: args_hex.clone(),
                kwargs: kwargs_hex.clone(),
                timeout: *timeout,
                env: env_map,
            };

            let (bytes, outcome) = client.execute(&req).await?;
            if *show_execution {
                print_single_execution(function, &outcome);
            }
            println!("{}", hex::encode(bytes));
        }
        Command::Map {
            file,
            function,
            items,
            max_containers,
            timeout,
            show_execution,
        } => {
            if items.is_empty() {
                bail!("no items given; pass at least one --item");
            }
            let client = resolve_client(&args)?;
            let code = read_source(file)?;
            let req = ExecuteBatchRequest {
                function_id: function_id(function, &code),
                code,
                function_name: function.clone(),
                items: items.clone(),
                max_containers: *max_containers,
                timeout: *timeout,
            };

            let batch = client.execute_batch(&req).await?;
            if *show_execution {
                print_batch_execution(function, &batch);
            }
            let decoded = decode_results(&batch)?;
            for bytes in decoded {
                println!("{}", hex::encode(bytes));
            }
        }
        Command::Health => {
            let client = resolve_client(&args)?;
            if client.health().await? {
                println!("✓ Worker is healthy");
            } else {
                eprintln!("✗ Worker is unhealthy");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

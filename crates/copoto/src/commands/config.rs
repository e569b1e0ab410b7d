//! Config command - manage named server contexts in client.yaml.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use copoto_config::{ClientConfig, Context as ServerContext};
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the current context name
    CurrentContext,

    /// List configured contexts
    GetContexts,

    /// Make a context the current one
    UseContext {
        /// Context name
        name: String,
    },

    /// Create or update a context
    SetContext {
        /// Context name
        name: String,

        /// Server URL (required for a new context)
        #[arg(long)]
        server: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Remove a context
    RemoveContext {
        /// Context name
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct ContextEntry<'a> {
    name: &'a str,
    server: &'a str,
    timeout: Option<u64>,
    current: bool,
}

#[derive(Debug, Serialize)]
struct CurrentContextOutput {
    name: Option<String>,
    server: Option<String>,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let mut config = copoto_config::load_client_config()?;

    match args.command {
        ConfigCommand::CurrentContext => current_context(&config, ctx),
        ConfigCommand::GetContexts => get_contexts(&config, ctx),
        ConfigCommand::UseContext { name } => {
            config.use_context(&name)?;
            copoto_config::save_client_config(&config)?;
            tracing::debug!(context = %name, "Switched context");
            println!("Switched to context \"{}\".", name);
            Ok(())
        }
        ConfigCommand::SetContext {
            name,
            server,
            timeout,
        } => set_context(&mut config, &name, server, timeout),
        ConfigCommand::RemoveContext { name } => {
            config
                .remove_context(&name)
                .ok_or_else(|| anyhow!("Context \"{}\" not found", name))?;
            copoto_config::save_client_config(&config)?;
            println!("Context \"{}\" removed.", name);
            Ok(())
        }
    }
}

fn current_context(config: &ClientConfig, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        return print_json(&CurrentContextOutput {
            name: config.current_context.clone(),
            server: config.current_server_url(),
        });
    }

    match (&config.current_context, config.current_server_url()) {
        (Some(name), Some(server)) => println!("{} ({})", name, server),
        (Some(name), None) => println!("{} (not defined)", name),
        (None, _) => println!("No current context. Use 'copoto config use-context <name>'."),
    }
    Ok(())
}

fn get_contexts(config: &ClientConfig, ctx: &Context) -> Result<()> {
    let current = config.current_context.as_deref();
    let entries: Vec<ContextEntry<'_>> = config
        .context_names()
        .into_iter()
        .filter_map(|name| config.get_context(name))
        .map(|c| ContextEntry {
            name: &c.name,
            server: &c.server,
            timeout: c.timeout,
            current: current == Some(c.name.as_str()),
        })
        .collect();

    if ctx.json_output {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No contexts configured.");
        println!("Add one with 'copoto config set-context <name> --server <url>'.");
        return Ok(());
    }

    println!("CURRENT  NAME            SERVER");
    for entry in entries {
        let marker = if entry.current { "*" } else { " " };
        println!("{:<8} {:<15} {}", marker, entry.name, entry.server);
    }
    Ok(())
}

fn set_context(
    config: &mut ClientConfig,
    name: &str,
    server: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let (context, verb) = match config.get_context(name).cloned() {
        Some(mut existing) => {
            if let Some(server) = server {
                existing.server = server;
            }
            if timeout.is_some() {
                existing.timeout = timeout;
            }
            (existing, "updated")
        }
        None => {
            let server = server
                .ok_or_else(|| anyhow!("--server is required for a new context \"{}\"", name))?;
            let mut context = ServerContext::new(name, server);
            if let Some(timeout) = timeout {
                context = context.with_timeout(timeout);
            }
            (context, "created")
        }
    };

    config.set_context(context);
    if config.current_context.is_none() {
        config.current_context = Some(name.to_string());
    }
    copoto_config::save_client_config(config)?;

    println!("Context \"{}\" {}.", name, verb);
    Ok(())
}

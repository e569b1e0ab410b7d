//! Status command - shows the stored session.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::{Context, print_json};
use crate::navigator::TerminalNavigator;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {}

/// Status for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    server_url: String,
    context: Option<String>,
    authenticated: bool,
    has_refresh_token: bool,
    has_anti_forgery_token: bool,
    pending_location: Option<String>,
    credentials_file: String,
}

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(TerminalNavigator::new())?;
    let credentials = client.credentials().snapshot();

    let output = StatusOutput {
        server_url: ctx.server_url.clone(),
        context: ctx.context.clone(),
        authenticated: credentials.access_token.is_some(),
        has_refresh_token: credentials.refresh_token.is_some(),
        has_anti_forgery_token: credentials.anti_forgery_token.is_some(),
        pending_location: client.terminator().pending_location(),
        credentials_file: ctx.credentials_path()?.display().to_string(),
    };

    if ctx.json_output {
        return print_json(&output);
    }

    let green = Style::new().green();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    println!();
    println!("{}", style("Copoto Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Server:"), output.server_url);
    if let Some(context) = &output.context {
        println!("  {} {}", dim.apply_to("Context:"), context);
    }
    if output.authenticated {
        println!("  {} {}", dim.apply_to("Session:"), green.apply_to("● logged in"));
    } else {
        println!("  {} {}", dim.apply_to("Session:"), yellow.apply_to("○ logged out"));
    }
    if let Some(location) = &output.pending_location {
        println!("  {} {}", dim.apply_to("Resume:"), location);
    }

    if ctx.verbose {
        println!();
        println!("  {} {}", dim.apply_to("Refresh token:"), yes_no(output.has_refresh_token));
        println!(
            "  {} {}",
            dim.apply_to("CSRF token:"),
            yes_no(output.has_anti_forgery_token)
        );
        println!("  {} {}", dim.apply_to("Credentials:"), output.credentials_file);
    }

    println!();
    Ok(())
}

fn yes_no(present: bool) -> &'static str {
    if present { "stored" } else { "none" }
}

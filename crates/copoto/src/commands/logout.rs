//! Logout command - end the session.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{Context, print_json};
use crate::navigator::TerminalNavigator;

/// Arguments for the logout command.
#[derive(Args, Debug)]
pub struct LogoutArgs {}

#[derive(Debug, Serialize)]
struct LogoutOutput {
    logged_out: bool,
    server_acknowledged: bool,
}

/// Run the logout command.
///
/// Local credentials are cleared even when the server call fails.
pub async fn run(_args: LogoutArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(TerminalNavigator::new())?;

    if !client.auth().is_authenticated() {
        if ctx.json_output {
            return print_json(&LogoutOutput {
                logged_out: true,
                server_acknowledged: false,
            });
        }
        println!("Not logged in.");
        return Ok(());
    }

    let acknowledged = match client.auth().logout().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Server logout failed");
            false
        }
    };

    if ctx.json_output {
        return print_json(&LogoutOutput {
            logged_out: true,
            server_acknowledged: acknowledged,
        });
    }

    if acknowledged {
        println!("Logged out.");
    } else {
        println!("Logged out locally (server did not confirm).");
    }
    Ok(())
}

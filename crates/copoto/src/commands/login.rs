//! Login command - sign in and persist the session.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, print_json};
use crate::navigator::TerminalNavigator;

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account ID
    pub id: String,

    /// Password (prompted when omitted)
    #[arg(long, env = "COPOTO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginOutput {
    authenticated: bool,
    server_url: String,
    pending_location: Option<String>,
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    let client = ctx.client(TerminalNavigator::new())?;
    client.auth().login(&args.id, &password).await?;

    let pending_location = client.terminator().pending_location();

    if ctx.json_output {
        return print_json(&LoginOutput {
            authenticated: true,
            server_url: ctx.server_url.clone(),
            pending_location,
        });
    }

    let green = Style::new().green();
    println!("{} Logged in to {}", green.apply_to("✓"), ctx.server_url);
    if let Some(location) = pending_location {
        println!("Run 'copoto resume' to return to {}.", location);
    }
    Ok(())
}

//! Resume command - return to where the last session ended.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{Context, print_json};
use crate::navigator::TerminalNavigator;

/// Arguments for the resume command.
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Fetch the location with GET after resuming
    #[arg(long)]
    pub replay: bool,
}

#[derive(Debug, Serialize)]
struct ResumeOutput {
    location: Option<String>,
    body: Option<serde_json::Value>,
}

/// Run the resume command.
pub async fn run(args: ResumeArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(TerminalNavigator::new())?;
    let location = client.resume_after_login()?;

    let body = match (&location, args.replay) {
        (Some(location), true) => Some(client.get::<serde_json::Value>(location).await?),
        _ => None,
    };

    if ctx.json_output {
        return print_json(&ResumeOutput { location, body });
    }

    match location {
        None => println!("Nothing to resume."),
        Some(location) => {
            println!("Resumed at {}", location);
            if let Some(body) = body {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }
    }
    Ok(())
}

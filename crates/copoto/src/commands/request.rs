//! Request command - send one API call through the session pipeline.

use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use copoto_client::RequestDescriptor;
use reqwest::Method;
use serde::Serialize;

use super::{Context, print_json};
use crate::navigator::TerminalNavigator;

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// API path relative to /api/ (e.g. posts/7)
    pub path: String,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct RequestOutput {
    status: u16,
    body: serde_json::Value,
}

/// Run the request command.
pub async fn run(args: RequestArgs, ctx: &Context) -> Result<()> {
    let method = parse_method(&args.method)?;
    let mut descriptor = RequestDescriptor::new(method, args.path.clone());
    for (key, value) in &args.query {
        descriptor = descriptor.with_query(key.clone(), value.clone());
    }
    if let Some(data) = &args.data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data must be valid JSON")?;
        descriptor = descriptor.with_json(&body)?;
    }

    let client = ctx.client(TerminalNavigator::at(&args.path, &args.query))?;
    let response = client.execute(descriptor).await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = if text.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    };

    if ctx.json_output {
        return print_json(&RequestOutput { status, body });
    }

    match body {
        serde_json::Value::Null => println!("{}", status),
        serde_json::Value::String(text) => println!("{}", text),
        body => println!("{}", serde_json::to_string_pretty(&body)?),
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(anyhow!("Unsupported method: {}", other)),
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

use std::io::Write;

use anyhow::{Context, Result};
use ollama_core::{GenerationClient, GenerationRequest, HttpTransport};

use crate::cli::Cli;

/// Generate text for `prompt` and write it, plus metadata if asked, to `out`.
pub fn run(cli: &Cli, prompt: &str, out: &mut impl Write) -> Result<()> {
    let transport = HttpTransport::for_server(&cli.server(), cli.transport());
    tracing::debug!(base_url = transport.base_url(), model = %cli.model, "generating");
    let client = GenerationClient::new(transport);

    let request = GenerationRequest::new(cli.model.as_str()).with_prompt(prompt);
    let response = client.generate(&request)?;

    writeln!(out, "{}", response.response).context("writing response")?;
    if cli.show_meta {
        if let Some(model) = &response.model {
            writeln!(out, "# model:    {model}")?;
        }
        if let Some(created_at) = &response.created_at {
            writeln!(out, "# created:  {created_at}")?;
        }
    }
    Ok(())
}

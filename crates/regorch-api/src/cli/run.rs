//! One-shot workflow commands: `regorch run` and `regorch key`.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use regorch_core::idempotency::key;
use regorch_types::workflow::{WorkflowKind, WorkflowRequest};

use crate::http::response::WorkflowResponse;
use crate::state::AppState;

async fn read_request(kind: WorkflowKind, file: &Path) -> Result<WorkflowRequest> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    WorkflowRequest::from_json(kind, &body)
        .with_context(|| format!("{} is not a valid {kind} request", file.display()))
}

/// Run one workflow and print its result.
pub async fn run_workflow(
    state: &AppState,
    kind: WorkflowKind,
    file: &Path,
    no_idempotency: bool,
    json: bool,
) -> Result<()> {
    let request = read_request(kind, file).await?;

    let outcome = match state.run_workflow(request, !no_idempotency).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if json {
                let error = serde_json::json!({
                    "error": { "code": e.kind(), "message": e.to_string() }
                });
                println!("{}", serde_json::to_string_pretty(&error)?);
            } else {
                eprintln!();
                eprintln!(
                    "  {} Workflow '{}' failed [{}]",
                    style("✗").red().bold(),
                    kind,
                    style(e.kind()).yellow()
                );
                eprintln!("  {e}");
                eprintln!();
            }
            anyhow::bail!("workflow {kind} failed");
        }
    };

    let response = WorkflowResponse::from(outcome);
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!();
    let verb = if response.replayed { "replayed" } else { "succeeded" };
    println!(
        "  {} Workflow '{}' {}",
        style("✓").green().bold(),
        style(kind).cyan(),
        verb
    );
    match &response.idempotency_key {
        Some(key) => println!("  Key: {}", style(key).bold()),
        None => println!("  Key: {}", style("(not recorded)").dim()),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&response.result)?);
    println!();
    Ok(())
}

/// Print the idempotency key a request file resolves to.
pub async fn print_key(kind: WorkflowKind, file: &Path, json: bool) -> Result<()> {
    let request = read_request(kind, file).await?;
    let resolved = key::resolve(&request);

    if json {
        let out = serde_json::json!({
            "workflow": kind.operation(),
            "explicit": request.has_explicit_key(),
            "key": resolved,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{resolved}");
    }
    Ok(())
}

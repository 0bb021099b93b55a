//! Branch commands: create, pull and merge.

use docbranch::{BranchAction, Store, create_branch, run_branch_task};

use super::CommandResult;
use crate::cli::DocArgs;
use crate::output::{OutputFormat, print_report};

/// Run the `branch` command
pub async fn branch(args: &DocArgs, store: &Store, format: OutputFormat) -> CommandResult {
    let target = store.require_doc(&args.id).await?;
    let fork = create_branch(store, &target).await?;
    match format {
        OutputFormat::Human => println!("Created branch {} of {}", fork.id(), target.id()),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "origin": target.id().as_str(),
                "branch": fork.id().as_str(),
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(true)
}

/// Run the `pull` command
pub async fn pull(args: &DocArgs, store: &Store, format: OutputFormat) -> CommandResult {
    run(args, store, BranchAction::Pull, format).await
}

/// Run the `merge` command
pub async fn merge(args: &DocArgs, store: &Store, format: OutputFormat) -> CommandResult {
    run(args, store, BranchAction::Merge, format).await
}

async fn run(
    args: &DocArgs,
    store: &Store,
    action: BranchAction,
    format: OutputFormat,
) -> CommandResult {
    let target = store.require_doc(&args.id).await?;
    let report = run_branch_task(store, &target, action).await?;
    print_report(&report, format)?;
    Ok(!report.is_empty())
}

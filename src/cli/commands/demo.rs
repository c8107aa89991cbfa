//! Demonstration domain commands (§3a): their own work is trivial — they
//! exist only to exercise `Pipeline::wrap` end-to-end, not to implement a
//! real task tracker.

use super::super::args::TodoCommands;
use super::super::run::{print_result, AppContext};
use mine_types::MineError;
use std::collections::BTreeMap;

pub async fn version(ctx: &AppContext) -> Result<(), MineError> {
    let result = ctx
        .pipeline
        .wrap("version", vec![], BTreeMap::new(), |_args, _flags| async {
            Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
        })
        .await?;
    print_result(&result);
    Ok(())
}

pub async fn echo(ctx: &AppContext, message: Vec<String>) -> Result<(), MineError> {
    let result = ctx
        .pipeline
        .wrap("echo", message, BTreeMap::new(), |args, _flags| async move {
            Ok(serde_json::json!({ "echo": args.join(" ") }))
        })
        .await?;
    print_result(&result);
    Ok(())
}

pub async fn todo(ctx: &AppContext, command: TodoCommands) -> Result<(), MineError> {
    match command {
        TodoCommands::Add { text } => {
            let result = ctx
                .pipeline
                .wrap("todo.add", text, BTreeMap::new(), |args, _flags| async move {
                    Ok(serde_json::json!({ "added": args.join(" ") }))
                })
                .await?;
            print_result(&result);
        }
    }
    Ok(())
}

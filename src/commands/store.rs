use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::value::Value;

pub struct StoreCommand;

#[async_trait]
impl Command for StoreCommand {
    fn name(&self) -> &str {
        "/store"
    }

    fn usage(&self) -> &str {
        "<literal> [--keep]"
    }

    fn description(&self) -> &str {
        "hold a value outside the workspace and print its handle"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let (literal, keep) = match args.strip_suffix("--keep") {
            Some(rest) => (rest.trim(), true),
            None => (args, false),
        };
        let Some(value) = Value::parse_literal(literal) else {
            println!("  usage: /store <literal> [--keep]");
            return CommandResult::Handled;
        };
        match info.session.store_object(value, keep).await {
            Ok(token) if keep => println!("  {token}"),
            Ok(token) => println!("  {token}  (valid for one use)"),
            Err(e) => println!("  error: {e}"),
        }
        CommandResult::Handled
    }
}

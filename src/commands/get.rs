use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, print_values};

pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    fn name(&self) -> &str {
        "/get"
    }

    fn usage(&self) -> &str {
        "<name>"
    }

    fn description(&self) -> &str {
        "show a workspace variable"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        if args.is_empty() {
            println!("  usage: /get <name>");
            return CommandResult::Handled;
        }
        match info.session.get_variable(args).await {
            Ok(values) => print_values(&values),
            Err(e) => println!("  error: {e}"),
        }
        CommandResult::Handled
    }
}

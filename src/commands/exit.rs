use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct ExitCommand;

#[async_trait]
impl Command for ExitCommand {
    fn name(&self) -> &str {
        "/exit"
    }

    fn aliases(&self) -> &[&str] {
        &["exit"]
    }

    fn description(&self) -> &str {
        "exit the engine and leave"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        match info.session.exit().await {
            Ok(()) => println!("  engine exited"),
            Err(e) => println!("  error: {e}"),
        }
        CommandResult::Quit
    }
}

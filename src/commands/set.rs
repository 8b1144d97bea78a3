use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::value::Value;

pub struct SetCommand;

#[async_trait]
impl Command for SetCommand {
    fn name(&self) -> &str {
        "/set"
    }

    fn usage(&self) -> &str {
        "<name> <literal>"
    }

    fn description(&self) -> &str {
        "assign a literal to a workspace variable"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some((name, literal)) = args.split_once(char::is_whitespace) else {
            println!("  usage: /set <name> <literal>");
            return CommandResult::Handled;
        };
        let Some(value) = Value::parse_literal(literal) else {
            println!("  not a literal: {}", literal.trim());
            return CommandResult::Handled;
        };
        if let Err(e) = info.session.set_variable(name, value).await {
            println!("  error: {e}");
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{loopback, test_info};
    use crate::interactor::Interactor;

    #[tokio::test]
    async fn sets_string_with_spaces() {
        let proxy = loopback();
        SetCommand
            .execute("greeting 'hello there'", &test_info(&proxy))
            .await;
        let values = proxy.get_variable("greeting").await.unwrap();
        assert_eq!(values, vec![Value::from("hello there")]);
    }

    #[tokio::test]
    async fn rejects_non_literals() {
        let proxy = loopback();
        SetCommand.execute("x other_var", &test_info(&proxy)).await;
        assert!(proxy.get_variable("x").await.is_err());
    }
}

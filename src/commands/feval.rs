use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, print_values, split_words};
use crate::value::Value;

pub struct FevalCommand;

#[async_trait]
impl Command for FevalCommand {
    fn name(&self) -> &str {
        "/feval"
    }

    fn usage(&self) -> &str {
        "<function> [literal...]"
    }

    fn description(&self) -> &str {
        "call a function with literal arguments"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let words = split_words(args);
        let Some((function, rest)) = words.split_first() else {
            println!("  usage: /feval <function> [literal...]");
            return CommandResult::Handled;
        };
        let mut values = Vec::with_capacity(rest.len());
        for word in rest {
            match Value::parse_literal(word) {
                Some(value) => values.push(value),
                None => {
                    println!("  not a literal: {word}");
                    return CommandResult::Handled;
                }
            }
        }
        match info.session.returning_feval(function, &values).await {
            Ok(results) => print_values(&results),
            Err(e) => println!("  error: {e}"),
        }
        CommandResult::Handled
    }
}

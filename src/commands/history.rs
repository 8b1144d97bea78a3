use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::consts::DEFAULT_HISTORY_LIMIT;

pub struct HistoryCommand;

#[async_trait]
impl Command for HistoryCommand {
    fn name(&self) -> &str {
        "/history"
    }

    fn usage(&self) -> &str {
        "[n | text]"
    }

    fn description(&self) -> &str {
        "show recent calls, or search them"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(history) = info.history else {
            println!("  history is not enabled");
            return CommandResult::Handled;
        };
        let entries = if args.is_empty() {
            history.recent(DEFAULT_HISTORY_LIMIT).await
        } else if let Ok(limit) = args.parse::<usize>() {
            history.recent(limit).await
        } else {
            history.search(args).await
        };
        match entries {
            Ok(entries) if entries.is_empty() => println!("  no history"),
            Ok(entries) => {
                for entry in entries {
                    println!("  {entry}");
                }
            }
            Err(e) => println!("  error: {e:#}"),
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::loopback;
    use crate::history::sqlite::SqliteHistory;
    use crate::history::{History, HistoryEntry, Outcome};

    #[tokio::test]
    async fn without_history_is_handled() {
        let proxy = loopback();
        let info = SessionInfo {
            session: &proxy,
            history: None,
        };
        assert_eq!(
            HistoryCommand.execute("", &info).await,
            CommandResult::Handled
        );
    }

    #[tokio::test]
    async fn lists_and_searches() {
        let proxy = loopback();
        let history = SqliteHistory::in_memory().unwrap();
        history
            .record(HistoryEntry::new("eval", "x = 1", Outcome::Ok))
            .await
            .unwrap();
        let info = SessionInfo {
            session: &proxy,
            history: Some(&history),
        };
        for args in ["", "5", "x ="] {
            assert_eq!(
                HistoryCommand.execute(args, &info).await,
                CommandResult::Handled
            );
        }
    }
}

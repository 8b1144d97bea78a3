//! Built-in REPL commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry handles dispatch, alias resolution,
//! and dynamic help generation. Anything that is not a command is
//! evaluated by the engine.

mod exit;
mod feval;
mod get;
mod help;
mod history;
mod quit;
mod set;
mod store;

use async_trait::async_trait;
use std::sync::Arc;

use crate::history::History;
use crate::interactor::Interactor;
use crate::value::Value;

/// Session handles available to commands during execution.
pub struct SessionInfo<'a> {
    pub session: &'a dyn Interactor<Vec<Value>>,
    pub history: Option<&'a dyn History>,
}

/// What the REPL should do after a command runs.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Not a command: evaluate the input in the engine.
    NotACommand,
    /// Command handled, continue the REPL loop.
    Handled,
    /// Leave the REPL.
    Quit,
}

/// A REPL command. Implement this trait to add new commands.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/get"`.
    fn name(&self) -> &str;

    /// Alternative names, e.g. `&["/h", "/?"]`.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Argument synopsis for `/help`, e.g. `"<name>"`.
    fn usage(&self) -> &str {
        ""
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Run the command with everything typed after its name.
    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult;
}

/// Holds registered commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(help::HelpCommand),
            Arc::new(get::GetCommand),
            Arc::new(set::SetCommand),
            Arc::new(feval::FevalCommand),
            Arc::new(store::StoreCommand),
            Arc::new(history::HistoryCommand),
            Arc::new(exit::ExitCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, info: &SessionInfo<'_>) -> CommandResult {
        let input = input.trim();
        let (cmd, args) = input
            .split_once(char::is_whitespace)
            .map(|(cmd, args)| (cmd, args.trim()))
            .unwrap_or((input, ""));

        for command in &self.commands {
            if cmd == command.name() || command.aliases().contains(&cmd) {
                // /help needs the registry to list all commands
                if command.name() == "/help" {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                return command.execute(args, info).await;
            }
        }

        if cmd.starts_with('/') {
            println!("unknown command: {cmd}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    /// Generate help text from all registered commands.
    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.usage(), c.aliases()), c.description()))
            .collect();

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out.push_str("  anything else is evaluated; end a line with ';' to discard its result\n");
        out
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// All registered names and aliases (for duplicate detection).
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, usage: &str, aliases: &[&str]) -> String {
    let mut label = name.to_string();
    if !usage.is_empty() {
        label.push(' ');
        label.push_str(usage);
    }
    if !aliases.is_empty() {
        label.push_str(&format!(" ({})", aliases.join(", ")));
    }
    label
}

/// Print returned values the way the engine's command window would.
pub fn print_values(values: &[Value]) {
    match values {
        [] => println!("  (no value)"),
        [only] => println!("  ans = {only}"),
        many => {
            for (i, value) in many.iter().enumerate() {
                println!("  ans{} = {value}", i + 1);
            }
        }
    }
}

/// Split command arguments on whitespace, keeping quoted text together.
fn split_words(args: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    for (i, c) in args.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => {
                quote = Some(c);
                start.get_or_insert(i);
            }
            (None, c) if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    words.push(&args[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        words.push(&args[s..]);
    }
    words
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::proxy::{ProxyConfig, RemoteProxy};
    use crate::transport::loopback::LoopbackEngine;

    pub(crate) fn loopback() -> RemoteProxy<LoopbackEngine> {
        RemoteProxy::new(LoopbackEngine::new(), ProxyConfig::default())
    }

    pub(crate) fn test_info(proxy: &RemoteProxy<LoopbackEngine>) -> SessionInfo<'_> {
        SessionInfo {
            session: proxy,
            history: None,
        }
    }

    #[test]
    fn all_builtins_registered() {
        let reg = CommandRegistry::new();
        let names = reg.names();
        for name in [
            "/help", "/get", "/set", "/feval", "/store", "/history", "/exit", "/quit",
        ] {
            assert!(names.contains(&name), "missing {name}");
        }
    }

    #[test]
    fn no_duplicate_triggers() {
        let reg = CommandRegistry::new();
        let triggers = reg.all_triggers();
        let mut seen = Vec::new();
        for t in &triggers {
            assert!(!seen.contains(t), "duplicate trigger: {t}");
            seen.push(t);
        }
    }

    #[test]
    fn help_text_includes_all_commands() {
        let reg = CommandRegistry::new();
        let text = reg.help_text();
        for name in reg.names() {
            assert!(text.contains(name), "help missing: {name}");
        }
        assert!(text.contains("/get <name>"));
    }

    #[tokio::test]
    async fn unknown_slash_command_is_handled() {
        let proxy = loopback();
        let reg = CommandRegistry::new();
        assert_eq!(
            reg.dispatch("/foobar", &test_info(&proxy)).await,
            CommandResult::Handled
        );
    }

    #[tokio::test]
    async fn engine_input_passes_through() {
        let proxy = loopback();
        let reg = CommandRegistry::new();
        assert_eq!(
            reg.dispatch("x = 1", &test_info(&proxy)).await,
            CommandResult::NotACommand
        );
        assert_eq!(
            reg.dispatch("plus(1, 2)", &test_info(&proxy)).await,
            CommandResult::NotACommand
        );
    }

    #[tokio::test]
    async fn arguments_reach_the_command() {
        let proxy = loopback();
        let reg = CommandRegistry::new();
        reg.dispatch("/set   answer   42", &test_info(&proxy)).await;
        let values = proxy.get_variable("answer").await.unwrap();
        assert_eq!(values, vec![Value::Double(42.0)]);
    }

    #[test]
    fn format_label_variants() {
        assert_eq!(format_label("/quit", "", &[]), "/quit");
        assert_eq!(format_label("/get", "<name>", &[]), "/get <name>");
        assert_eq!(format_label("/help", "", &["/h", "/?"]), "/help (/h, /?)");
    }

    #[test]
    fn split_words_keeps_quotes() {
        assert_eq!(split_words("a  'b c' 3"), vec!["a", "'b c'", "3"]);
        assert_eq!(split_words(""), Vec::<&str>::new());
        assert_eq!(split_words("\"x y\""), vec!["\"x y\""]);
    }
}

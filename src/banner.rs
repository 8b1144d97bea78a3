//! Startup banner and session summary display.

use crate::consts::{AUTHOR, HOMEPAGE, REPO};

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    /// `loopback` or the bridge command line.
    pub transport: &'a str,
    pub timeout_secs: u64,
    pub history: &'a str,
}

/// Print the startup banner with session info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║           M A T L A B C T L           ║
   ║    an engine session, at arm's length ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   repo      {}
   engine    {}
   timeout   {}s
   history   {}

   type /help for commands
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.transport,
        info.timeout_secs,
        info.history,
    );
}

/// Print the session summary (request count + farewell).
pub fn print_session_summary(requests: usize, engine_running: bool) {
    if requests > 0 {
        println!("session: {requests} request(s) sent");
    }
    if engine_running {
        println!("engine left running.");
    }
    println!("goodbye.");
}

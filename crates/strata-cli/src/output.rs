//! Terminal output helpers
//!
//! Everything except the readiness message goes to stderr, keeping stdout
//! scriptable: a shell can capture exactly one line describing where the
//! tunnel listens.

use std::net::SocketAddr;

use crossterm::style::Stylize;

/// Print the readiness message for an established tunnel to stdout
pub fn print_ready(database: &str, branch: &str, addr: SocketAddr) {
    println!("{}", ready_message(database, branch, addr));
}

pub(crate) fn ready_message(database: &str, branch: &str, addr: SocketAddr) -> String {
    format!(
        "Secure connection to database {} and branch {} is established!\n\n\
         Local address to connect your application: {} (press ctrl-c to quit)",
        database.bold().blue(),
        branch.bold().blue(),
        addr.to_string().bold().blue(),
    )
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_message_names_the_target() {
        let addr: SocketAddr = "127.0.0.1:3307".parse().unwrap();
        let message = ready_message("shop", "main", addr);

        assert!(message.contains("shop"));
        assert!(message.contains("main"));
        assert!(message.contains("127.0.0.1:3307"));
        assert!(message.contains("press ctrl-c to quit"));
    }
}

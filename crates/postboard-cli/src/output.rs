//! Output formatting for the CLI.

use clap::ValueEnum;
use session_state::SessionState;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    println!("{}", render_message("success", message, format));
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!("{}", render_message("error", message, format)),
    }
}

/// Print the session state.
pub fn print_state(state: &SessionState, format: &OutputFormat) {
    println!("{}", render_state(state, format));
}

fn render_message(status: &str, message: &str, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Text => message.to_string(),
        OutputFormat::Json => {
            serde_json::json!({ "status": status, "message": message }).to_string()
        }
    }
}

fn render_state(state: &SessionState, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut lines = Vec::new();
            match state.user() {
                Some(user) => {
                    lines.push(row("Auth", "logged in"));
                    lines.push(row("User ID", &user.id));
                    if !user.email.is_empty() {
                        lines.push(row("Email", &user.email));
                    }
                }
                None => lines.push(row("Auth", "not logged in")),
            }
            lines.push(row("Status", &state.status().to_string()));
            if let Some(error) = state.error() {
                lines.push(row("Error", error));
            }
            lines.join("\n")
        }
        OutputFormat::Json => {
            serde_json::to_string(state).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

fn row(label: &str, value: &str) -> String {
    format!("{:<9} {}", format!("{}:", label), value)
}

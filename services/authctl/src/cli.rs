//! Command-line parsing
//!
//! `authctl [--config <path>] <command> [args...]`

use anyhow::{Result, bail};

pub const USAGE: &str = "usage: authctl [--config <path>] <login <access> <refresh> | logout | status | get <path> | post <path> [json]>";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Store a credential pair obtained from a sign-in.
    Login { access: String, refresh: String },
    /// Clear stored credentials.
    Logout,
    /// Report whether credentials are present.
    Status,
    Get { path: String },
    Post { path: String, body: Option<String> },
}

#[derive(Debug, PartialEq, Eq)]
pub struct Cli {
    pub config_path: Option<String>,
    pub command: Command,
}

impl Cli {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut config_path = None;
        let mut rest = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "--config" {
                match iter.next() {
                    Some(p) => config_path = Some(p.clone()),
                    None => bail!("--config requires a path\n{USAGE}"),
                }
            } else {
                rest.push(arg.as_str());
            }
        }

        let command = match rest.as_slice() {
            ["login", access, refresh] => Command::Login {
                access: access.to_string(),
                refresh: refresh.to_string(),
            },
            ["logout"] => Command::Logout,
            ["status"] => Command::Status,
            ["get", path] => Command::Get {
                path: path.to_string(),
            },
            ["post", path] => Command::Post {
                path: path.to_string(),
                body: None,
            },
            ["post", path, body] => Command::Post {
                path: path.to_string(),
                body: Some(body.to_string()),
            },
            [] => bail!("missing command\n{USAGE}"),
            other => bail!("unrecognized arguments: {}\n{USAGE}", other.join(" ")),
        };

        Ok(Self {
            config_path,
            command,
        })
    }
}

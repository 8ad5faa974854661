#![forbid(unsafe_code)]

//! `prts-session-ctl` — local CLI companion for `prts-session`.
//!
//! Connects to the IPC socket and sends JSON commands to the running
//! session supervisor, authenticated with the token the session wrote to
//! `$XDG_RUNTIME_DIR/prts-session/<ipc-name>.token`.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

use prts_session::ipc::token::{read_token_file, token_path};

#[derive(Debug, Parser)]
#[command(
    name = "prts-session-ctl",
    about = "Local CLI for the prts-session supervisor",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the session's `ipc_name` config).
    #[arg(long, default_value = "prts-session")]
    ipc_name: String,

    /// Token file written by the session (defaults to the runtime-dir path
    /// derived from `--ipc-name`).
    #[arg(long)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// End the session: stop every managed process, then exit.
    Logout,

    /// Show the startup phase and the managed processes.
    Status,

    /// Report that the compositor is ready, ending the readiness wait.
    Ready,
}

impl Command {
    fn verb(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::Status => "status",
            Self::Ready => "ready",
        }
    }
}

fn main() {
    let args = Cli::parse();
    let token_file = args
        .token_file
        .clone()
        .unwrap_or_else(|| token_path(&args.ipc_name));
    let auth_token = match read_token_file(&token_file) {
        Ok(token) => token,
        Err(err) => {
            eprintln!("Failed to read session token {}: {err}", token_file.display());
            std::process::exit(1);
        }
    };
    let request_json = serde_json::json!({
        "command": args.command.verb(),
        "auth_token": auth_token,
    });

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    if let Some(data) = obj.get("data") {
                        println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                    } else {
                        println!("OK");
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to session: {err}");
            eprintln!("Is prts-session running with ipc_name '{}'?", args.ipc_name);
            std::process::exit(1);
        }
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    if response_line.trim().is_empty() {
        return Err("session closed the connection without a response".into());
    }

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}

//! Interactive shell example
//!
//! Opens a shell, waits for the first prompt, then runs a `sudo` command
//! and answers its password prompt automatically.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example interactive -- --host localhost --user your_username --password your_password
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use sshprompt::DriverBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("=== sshprompt Interactive Shell Example ===\n");

    let mut builder = DriverBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .timeout(Duration::from_secs(args.timeout))
        .recv_timeout(Duration::from_secs(args.timeout))
        .prompt(r"[$#]\s*$")
        .on_recv_partial_text(|text| print!("{}", text))
        .danger_disable_host_key_verification();

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let mut driver = builder.build()?;

    println!("Connecting to {}:{}...", args.host, args.port);
    driver.open_shell().await?;

    // Login banner and first prompt
    let outcome = driver.recv_text().await?;
    println!("\n--- first prompt: {:?} ({:?})", outcome.prompt, outcome.stop);

    // sudo may or may not ask for a password; answer it if it does
    let mut replies = IndexMap::new();
    if let Some(password) = &args.password {
        replies.insert(r"\[sudo\] password for [^:]+:".to_string(), format!("{}\n", password));
    }

    driver.send_text("sudo -k; sudo id\n").await?;
    let outcome = driver.recv_text_with(Some(&replies), None).await?;
    println!(
        "\n--- sudo finished: prompt={:?}, auto-replies sent={}, elapsed={:?}",
        outcome.prompt, outcome.auto_replies_sent, outcome.elapsed
    );

    println!("Closing connection...");
    driver.close_shell().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => host = value.unwrap_or(host),
                "--port" | "-p" => port = value.and_then(|v| v.parse().ok()).unwrap_or(22),
                "--user" | "-u" => user = value.unwrap_or(user),
                "--password" | "-P" => password = value,
                "--key" | "-k" => key = value.map(PathBuf::from),
                "--timeout" | "-t" => {
                    timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30)
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"sshprompt interactive example

Opens a shell and answers a sudo password prompt automatically.

USAGE:
    cargo run --example interactive -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -t, --timeout <SECS>     Connect and idle timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}

//! Interactive console for a running StripeKV server.
//!
//! Usage: `skv-cli [host] [port]` (defaults: 127.0.0.1 6379). Reads one
//! command per line, executes it through the client library, and prints
//! a human-readable result.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use skv_client::{ClientError, KvClient};

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().unwrap_or_else(|| "6379".to_string());
    let addr = format!("{host}:{port}");

    let client = match KvClient::connect(addr.clone()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{addr}: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = client.ping() {
        eprintln!("cannot reach {addr}: {err}");
        return ExitCode::FAILURE;
    }

    println!("Connected to StripeKV at {addr}");
    println!("Commands: SET key value [ttl], GET key, DEL key, PING, SIZE, QUIT");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            continue;
        };

        if command.eq_ignore_ascii_case("QUIT") {
            break;
        }
        match run(&client, command, &tokens[1..]) {
            Ok(output) => println!("{output}"),
            Err(ClientError::Server { message }) => {
                println!("(error) {}", String::from_utf8_lossy(&message));
            }
            Err(err) => {
                println!("(error) {err}");
            }
        }
    }

    ExitCode::SUCCESS
}

fn run(client: &KvClient, command: &str, args: &[&str]) -> Result<String, ClientError> {
    if command.eq_ignore_ascii_case("PING") {
        client.ping()?;
        return Ok("PONG".to_string());
    }
    if command.eq_ignore_ascii_case("SET") {
        let (key, value) = match args {
            [key, value, ..] => (key.as_bytes(), value.as_bytes()),
            _ => return Ok("(error) usage: SET key value [ttl]".to_string()),
        };
        // Match the server's leniency: a bad TTL token means no expiry.
        let ttl = args.get(2).and_then(|raw| raw.parse::<u64>().ok()).unwrap_or(0);
        if ttl > 0 {
            client.set_with_ttl(key, value, Duration::from_secs(ttl))?;
        } else {
            client.set(key, value)?;
        }
        return Ok("OK".to_string());
    }
    if command.eq_ignore_ascii_case("GET") {
        let [key] = args else {
            return Ok("(error) usage: GET key".to_string());
        };
        return Ok(match client.get(key.as_bytes())? {
            Some(value) => String::from_utf8_lossy(&value).into_owned(),
            None => "(nil)".to_string(),
        });
    }
    if command.eq_ignore_ascii_case("DEL") {
        let [key] = args else {
            return Ok("(error) usage: DEL key".to_string());
        };
        return Ok(if client.delete(key.as_bytes())? {
            "OK".to_string()
        } else {
            "(error) key not found".to_string()
        });
    }
    if command.eq_ignore_ascii_case("SIZE") {
        return Ok(client.size()?.to_string());
    }
    Ok("(error) unknown command".to_string())
}

use clap::Parser;
use fixml_types::Message;

use umpf_client::cli::{self, Cli, DEFAULT_PORT};
use umpf_client::error::ClientError;
use umpf_client::{pretty, transport};

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {}
        Err(ClientError::Connect { host }) => {
            eprintln!("cannot connect to host {host}.");
            std::process::exit(1);
        }
        Err(ClientError::Timeout) => {
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<(), ClientError> {
    let body = cli::build_request(&cli.command)?;
    let request = Message::request(body);
    let reply = transport::roundtrip(&cli.host, DEFAULT_PORT, &request)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    pretty::print_reply(&reply, &mut out);
    Ok(())
}

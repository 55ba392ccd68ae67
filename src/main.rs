pub mod peer;

use std::env;

use rover_signal::SignalingConfig;

use crate::peer::Role;

mod util;

fn main() {
    let args: Vec<String> = env::args().collect();

    let role = match args.get(1).map(String::as_str) {
        Some("listen") => Role::Listener,
        Some("offer") => Role::Offerer,
        Some("answer") => Role::Answerer,
        _ => {
            print_usage();
            return;
        }
    };

    util::init_log();

    let config = match args.get(2) {
        Some(url) => SignalingConfig::new(url),
        None => SignalingConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            println!("Invalid configuration: {}", e);
            return;
        }
    };

    match peer::main(role, config) {
        Ok(_) => println!("Peer completed successfully"),
        Err(e) => println!("Peer error:\n{:#}", e),
    }
}

fn print_usage() {
    println!("Rover Signal");
    println!("Usage:");
    println!("  rover-signal listen [url]  - Log everything received from the relay");
    println!("  rover-signal offer [url]   - Send an offer and host candidates");
    println!("  rover-signal answer [url]  - Answer any offer received");
    println!();
    println!("The relay url defaults to $SIGNALING_URL, then ws://127.0.0.1:8080");
}

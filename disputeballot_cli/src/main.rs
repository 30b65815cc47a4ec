#[macro_use]
extern crate log;

use clap::{value_parser, Arg, ArgAction, Command};
use log::LevelFilter;

mod command_dispute;
mod command_e2e;
mod command_finalize;
mod command_keygen;
mod command_tally;
mod command_vote;
mod config;

use command_dispute::*;
use command_e2e::*;
use command_finalize::*;
use command_keygen::*;
use command_tally::*;
use command_vote::*;
use config::Config;

fn dispute_id_arg() -> Arg {
    Arg::new("DISPUTE-ID")
        .index(1)
        .required(true)
        .value_parser(value_parser!(u32))
        .help("Ledger dispute id")
}

fn keys_arg() -> Arg {
    Arg::new("keys")
        .long("keys")
        .required(true)
        .value_name("FILE")
        .help("Voting keypair file written by `keygen`")
}

fn strict_arg() -> Arg {
    Arg::new("strict")
        .long("strict")
        .action(ArgAction::SetTrue)
        .help("Abort on the first malformed ballot instead of excluding it")
}

#[tokio::main]
async fn main() {
    let matches = Command::new("DisputeBallot CLI")
        .version("0.1")
        .about("Anonymous weighted voting on ledger disputes")
        .arg(
            Arg::new("uri")
                .long("uri")
                .global(true)
                .help("Ledger gateway uri - can also be set with DISPUTEBALLOT_URI"),
        )
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .global(true)
                .help("Hex ed25519 signing key - can also be set with DISPUTEBALLOT_SECRET_KEY"),
        )
        .arg(
            Arg::new("maintainer")
                .long("maintainer")
                .global(true)
                .help("Maintainer address - can also be set with DISPUTEBALLOT_MAINTAINER"),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .global(true)
                .value_parser(value_parser!(u32))
                .help("Project id - can also be set with DISPUTEBALLOT_PROJECT_ID"),
        )
        .arg(
            Arg::new("min-votes")
                .long("min-votes")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Ballots needed before finalizing - can also be set with DISPUTEBALLOT_MIN_VOTES"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate a voting keypair and write it to a key file")
                .arg(
                    Arg::new("dispute")
                        .long("dispute")
                        .value_parser(value_parser!(u32))
                        .help("Bind the keys to one dispute"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .default_value(".")
                        .help("Directory for the key file"),
                )
                .arg(
                    Arg::new("publish")
                        .long("publish")
                        .action(ArgAction::SetTrue)
                        .help("Publish the public key as the project's voting config"),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Register to vote on a dispute")
                .arg(dispute_id_arg()),
        )
        .subcommand(
            Command::new("vote")
                .about("Cast an anonymous ballot")
                .arg(dispute_id_arg())
                .arg(
                    Arg::new("CHOICE")
                        .index(2)
                        .required(true)
                        .help("approve, reject or abstain"),
                ),
        )
        .subcommand(
            Command::new("tally")
                .about("Decrypt and tally a dispute's ballots without submitting")
                .arg(dispute_id_arg())
                .arg(keys_arg())
                .arg(strict_arg()),
        )
        .subcommand(
            Command::new("finalize")
                .about("Tally a dispute and reveal the result to the ledger")
                .arg(dispute_id_arg())
                .arg(keys_arg())
                .arg(strict_arg())
                .arg(
                    Arg::new("allow-incomplete")
                        .long("allow-incomplete")
                        .action(ArgAction::SetTrue)
                        .help("Submit even if some ballots were excluded"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show a dispute and its lifecycle state")
                .arg(dispute_id_arg()),
        )
        .subcommand(Command::new("list").about("List every dispute on the ledger"))
        .subcommand(
            Command::new("e2e")
                .about("Run a full local dispute round against an in-memory ledger")
                .arg(
                    Arg::new("voters")
                        .long("voters")
                        .default_value("5")
                        .value_parser(value_parser!(u32))
                        .help("Number of voters"),
                ),
        )
        .get_matches();

    let level = match matches.get_count("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = Config::from_env()
        .unwrap_or_else(|e| {
            eprintln!("disputeballot: {}", e);
            std::process::exit(1);
        })
        .merge_args(&matches)
        .unwrap_or_else(|e| {
            eprintln!("disputeballot: {}", e);
            std::process::exit(1);
        });
    info!("URI: {}", config.uri);

    // Subcommands
    match matches.subcommand() {
        Some(("keygen", matches)) => command_keygen(matches, &config).await,
        Some(("register", matches)) => command_register(matches, &config).await,
        Some(("vote", matches)) => command_vote(matches, &config).await,
        Some(("tally", matches)) => command_tally(matches, &config).await,
        Some(("finalize", matches)) => command_finalize(matches, &config).await,
        Some(("status", matches)) => command_status(matches, &config).await,
        Some(("list", matches)) => command_list(matches, &config).await,
        Some(("e2e", matches)) => command_e2e(matches).await,
        _ => {
            eprintln!("disputeballot: no command given, see --help");
            std::process::exit(1);
        }
    }
}

/// Expand `~` and environment variables in a path argument
pub fn expand(input: &str) -> String {
    match shellexpand::full(input) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            eprintln!("disputeballot: unable to expand {}: {}", input, e);
            std::process::exit(1);
        }
    }
}

/// Print an error and exit
pub fn fail(command: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("disputeballot {}: {}", command, e);
    std::process::exit(1);
}

use crate::config::Config;
use crate::fail;
use disputeballot::{BallotSubmitter, RpcLedger, VoteChoice};
use std::str::FromStr;

pub async fn command_register(matches: &clap::ArgMatches, config: &Config) {
    let dispute_id = *matches
        .get_one::<u32>("DISPUTE-ID")
        .unwrap_or_else(|| fail("register", "dispute-id required"));

    let signer = config.signer();
    let ledger = RpcLedger::new(&config.uri);
    let submitter = BallotSubmitter::new(&ledger, config.confirmation.clone());

    let hash = submitter
        .register(&signer, dispute_id)
        .await
        .unwrap_or_else(|e| fail("register", e));
    println!("> Registered for dispute {} in {}", dispute_id, hash);
}

pub async fn command_vote(matches: &clap::ArgMatches, config: &Config) {
    let dispute_id = *matches
        .get_one::<u32>("DISPUTE-ID")
        .unwrap_or_else(|| fail("vote", "dispute-id required"));
    let choice = matches
        .get_one::<String>("CHOICE")
        .map(|choice| VoteChoice::from_str(choice))
        .transpose()
        .unwrap_or_else(|e| fail("vote", e));

    let signer = config.signer();
    let ledger = RpcLedger::new(&config.uri);
    let submitter = BallotSubmitter::new(&ledger, config.confirmation.clone());

    let hash = submitter
        .cast(&signer, dispute_id, choice)
        .await
        .unwrap_or_else(|e| fail("vote", e));
    println!("> Ballot for dispute {} stored in {}", dispute_id, hash);
}

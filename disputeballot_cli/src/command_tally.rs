use crate::config::Config;
use crate::{expand, fail};
use disputeballot::{tally_dispute, KeyPair, RejectionPolicy, RpcLedger, TallyReport};

pub fn rejection_policy(matches: &clap::ArgMatches) -> RejectionPolicy {
    if matches.get_flag("strict") {
        RejectionPolicy::Strict
    } else {
        RejectionPolicy::Exclude
    }
}

/// Load the key file named by `--keys`
pub async fn load_keys(command: &str, matches: &clap::ArgMatches) -> KeyPair {
    let path = matches
        .get_one::<String>("keys")
        .map(|path| expand(path))
        .unwrap_or_else(|| fail(command, "--keys required"));
    KeyPair::load_from_path(&path)
        .await
        .unwrap_or_else(|e| fail(command, format!("unable to load {}: {}", path, e)))
}

pub fn print_report(report: &TallyReport) {
    println!("Tally:");
    println!("  approve: {}", report.tallies[0]);
    println!("  reject:  {}", report.tallies[1]);
    println!("  abstain: {}", report.tallies[2]);
    println!("  ballots: {}", report.included.len());
    for rejection in &report.rejected {
        println!("  excluded {}: {}", rejection.voter, rejection.reason);
    }
    println!("Outcome: {:?}", report.outcome());
}

pub async fn command_tally(matches: &clap::ArgMatches, config: &Config) {
    let dispute_id = *matches
        .get_one::<u32>("DISPUTE-ID")
        .unwrap_or_else(|| fail("tally", "dispute-id required"));
    let keypair = load_keys("tally", matches).await;

    let ledger = RpcLedger::new(&config.uri);
    let report = tally_dispute(&ledger, dispute_id, &keypair, rejection_policy(matches))
        .await
        .unwrap_or_else(|e| fail("tally", e));

    print_report(&report);
    let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| fail("tally", e));
    println!("{}", json);
}

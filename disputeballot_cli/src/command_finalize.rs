use crate::command_tally::{load_keys, print_report, rejection_policy};
use crate::config::Config;
use crate::fail;
use disputeballot::{tally_dispute, DisputeLifecycleCoordinator, ProofSubmitter, RpcLedger};

pub async fn command_finalize(matches: &clap::ArgMatches, config: &Config) {
    let dispute_id = *matches
        .get_one::<u32>("DISPUTE-ID")
        .unwrap_or_else(|| fail("finalize", "dispute-id required"));
    let keypair = load_keys("finalize", matches).await;

    let signer = config.signer();
    let ledger = RpcLedger::new(&config.uri);
    let coordinator = DisputeLifecycleCoordinator::new(&ledger, config.coordinator(&signer));

    let report = tally_dispute(&ledger, dispute_id, &keypair, rejection_policy(matches))
        .await
        .unwrap_or_else(|e| fail("finalize", e));
    print_report(&report);

    let submitter = ProofSubmitter::new(&coordinator, config.confirmation.clone())
        .allow_incomplete(matches.get_flag("allow-incomplete"));
    let finalized = submitter
        .finalize_report(&signer, &report)
        .await
        .unwrap_or_else(|e| fail("finalize", e));

    println!(
        "> Dispute {} finalized as {} in {}",
        dispute_id, finalized.dispute.status, finalized.hash
    );
    if let Some(winner) = &finalized.dispute.winner {
        println!("  The winner is {}", winner);
    }
}

use crate::command_tally::print_report;
use crate::fail;
use disputeballot::*;
use rand::Rng;
use std::time::Duration;

const PROJECT_ID: u32 = 1;
const VOTING_WINDOW: u64 = 3600;

pub async fn command_e2e(matches: &clap::ArgMatches) {
    let voters = *matches.get_one::<u32>("voters").unwrap_or(&5);
    let policy = ConfirmationPolicy {
        max_attempts: 5,
        delay: Duration::from_millis(10),
    };

    let maintainer = Ed25519Signer::generate();
    let creator = Ed25519Signer::generate();
    let counterpart = Ed25519Signer::generate();

    let ledger = MemLedger::new(maintainer.address().clone());
    let opened_at = unix_now();
    ledger.set_time(opened_at);

    let keypair = tokio::task::spawn_blocking(|| KeyPair::generate(PROJECT_ID, None))
        .await
        .unwrap_or_else(|e| fail("e2e", e))
        .unwrap_or_else(|e| fail("e2e", e));
    keypair
        .publish(&ledger, &maintainer, maintainer.address(), &policy)
        .await
        .unwrap_or_else(|e| fail("e2e", e));
    println!("> Voting key published OK");

    let dispute_id = ledger.create_dispute(
        PROJECT_ID,
        creator.address().clone(),
        counterpart.address().clone(),
        "e2e dispute",
        opened_at + VOTING_WINDOW,
    );
    println!("> Dispute {} opened OK", dispute_id);

    let coordinator =
        DisputeLifecycleCoordinator::new(&ledger, CoordinatorConfig::new(maintainer.address().clone()));
    let submitter = BallotSubmitter::new(&ledger, policy.clone()).with_coordinator(&coordinator);

    let mut rng = rand::thread_rng();
    for _ in 0..voters {
        let voter = Ed25519Signer::generate();
        let choice = VoteChoice::from_index(Some(rng.gen_range(0..NUM_CHOICES as u8)))
            .unwrap_or_else(|e| fail("e2e", e));

        submitter
            .register(&voter, dispute_id)
            .await
            .unwrap_or_else(|e| fail("e2e", e));
        submitter
            .cast(&voter, dispute_id, Some(choice))
            .await
            .unwrap_or_else(|e| fail("e2e", e));
        info!("{} voted {}", voter.address(), choice);
    }
    println!("> {} ballots cast OK", voters);

    ledger.set_time(opened_at + VOTING_WINDOW);
    let report = tally_dispute(&ledger, dispute_id, &keypair, RejectionPolicy::Strict)
        .await
        .unwrap_or_else(|e| fail("e2e", e));
    print_report(&report);

    let finalized = ProofSubmitter::new(&coordinator, policy)
        .finalize_report(&maintainer, &report)
        .await
        .unwrap_or_else(|e| fail("e2e", e));
    println!("> Dispute {} finalized as {} OK", dispute_id, finalized.dispute.status);

    match &finalized.dispute.winner {
        Some(winner) if winner == creator.address() => println!("  The creator {} wins", winner),
        Some(winner) => println!("  The counterpart {} wins", winner),
        None => println!("  No winner"),
    }
}

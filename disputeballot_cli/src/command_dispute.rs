use crate::config::Config;
use crate::fail;
use disputeballot::{Dispute, DisputeLifecycleCoordinator, Ledger, LifecycleState, RpcLedger};

fn print_dispute(dispute: &Dispute, state: LifecycleState) {
    println!("Dispute #{} ({})", dispute.id, state);
    println!("  project:     {}", dispute.project_id);
    println!("  creator:     {}", dispute.creator);
    println!("  counterpart: {}", dispute.counterpart);
    println!("  voting ends: {}", dispute.voting_ends_at);
    println!("  registered:  {}", dispute.registered.len());
    println!("  ballots:     {}", dispute.ballots.len());
    if state == LifecycleState::Finalized {
        println!(
            "  votes:       {} approve, {} reject, {} abstain",
            dispute.votes.approve, dispute.votes.reject, dispute.votes.abstain
        );
        match &dispute.winner {
            Some(winner) => println!("  winner:      {}", winner),
            None => println!("  winner:      none"),
        }
    }
}

pub async fn command_status(matches: &clap::ArgMatches, config: &Config) {
    let dispute_id = *matches
        .get_one::<u32>("DISPUTE-ID")
        .unwrap_or_else(|| fail("status", "dispute-id required"));

    let ledger = RpcLedger::new(&config.uri);
    let coordinator = DisputeLifecycleCoordinator::new(&ledger, config.read_only_coordinator());

    let dispute = coordinator
        .snapshot(dispute_id)
        .await
        .unwrap_or_else(|e| fail("status", e));
    let now = ledger.timestamp().await.unwrap_or_else(|e| fail("status", e));
    print_dispute(&dispute, LifecycleState::of(&dispute, now));
}

pub async fn command_list(_matches: &clap::ArgMatches, config: &Config) {
    let ledger = RpcLedger::new(&config.uri);
    let coordinator = DisputeLifecycleCoordinator::new(&ledger, config.read_only_coordinator());

    let disputes = coordinator
        .list_disputes()
        .await
        .unwrap_or_else(|e| fail("list", e));
    let now = ledger.timestamp().await.unwrap_or_else(|e| fail("list", e));

    if disputes.is_empty() {
        println!("No disputes");
    }
    for dispute in disputes {
        println!(
            "#{}  {}  {} ballots  {}",
            dispute.id,
            LifecycleState::of(&dispute, now),
            dispute.ballots.len(),
            dispute.proof
        );
    }
}

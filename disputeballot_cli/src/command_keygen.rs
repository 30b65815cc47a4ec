use crate::config::Config;
use crate::{expand, fail};
use disputeballot::{KeyPair, RpcLedger};

pub async fn command_keygen(matches: &clap::ArgMatches, config: &Config) {
    let dispute_id = matches.get_one::<u32>("dispute").copied();
    let out = matches
        .get_one::<String>("out")
        .map(|dir| expand(dir))
        .unwrap_or_else(|| ".".to_owned());

    // RSA key generation is slow, keep it off the runtime
    let project_id = config.project_id;
    let keypair = tokio::task::spawn_blocking(move || KeyPair::generate(project_id, dispute_id))
        .await
        .unwrap_or_else(|e| fail("keygen", e))
        .unwrap_or_else(|e| fail("keygen", e));

    let key_file = keypair.to_key_file().unwrap_or_else(|e| fail("keygen", e));
    let path = key_file
        .persist(&out)
        .await
        .unwrap_or_else(|e| fail("keygen", e));

    println!("key-file: {}", path.display());
    println!("public-key: {}", key_file.public_key);
    println!("> Keep this file safe. Ballots cannot be tallied without it.");

    if matches.get_flag("publish") {
        let signer = config.signer();
        let maintainer = config.maintainer_or(&signer);
        let ledger = RpcLedger::new(&config.uri);

        let hash = keypair
            .publish(&ledger, &signer, &maintainer, &config.confirmation)
            .await
            .unwrap_or_else(|e| fail("keygen", e));
        println!("> Published voting key for project {} in {}", project_id, hash);
    }
}

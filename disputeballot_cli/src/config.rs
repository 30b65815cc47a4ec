use disputeballot::{Address, ConfirmationPolicy, CoordinatorConfig, Ed25519Signer};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_URI: &str = "http://localhost:8000";

/// CLI settings, from `DISPUTEBALLOT_*` variables with command line overrides
#[derive(Clone, Debug)]
pub struct Config {
    pub uri: String,
    pub secret_key: Option<String>,
    pub maintainer: Option<Address>,
    pub project_id: u32,
    pub min_votes: usize,
    pub confirmation: ConfirmationPolicy,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid {}: {}", name, e)),
        None => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = ConfirmationPolicy::default();
        let maintainer = parse_env::<Address>("DISPUTEBALLOT_MAINTAINER")?;
        let attempts = parse_env::<u32>("DISPUTEBALLOT_CONFIRM_ATTEMPTS")?;
        let delay_ms = parse_env::<u64>("DISPUTEBALLOT_CONFIRM_DELAY_MS")?;

        Ok(Config {
            uri: env_var("DISPUTEBALLOT_URI").unwrap_or_else(|| DEFAULT_URI.to_owned()),
            secret_key: env_var("DISPUTEBALLOT_SECRET_KEY"),
            maintainer,
            project_id: parse_env::<u32>("DISPUTEBALLOT_PROJECT_ID")?.unwrap_or(1),
            min_votes: parse_env::<usize>("DISPUTEBALLOT_MIN_VOTES")?.unwrap_or(1),
            confirmation: ConfirmationPolicy {
                max_attempts: attempts.unwrap_or(defaults.max_attempts),
                delay: delay_ms.map(Duration::from_millis).unwrap_or(defaults.delay),
            },
        })
    }

    /// Let command line flags win over the environment
    pub fn merge_args(mut self, matches: &clap::ArgMatches) -> Result<Self, String> {
        if let Some(uri) = matches.get_one::<String>("uri") {
            self.uri = uri.clone();
        }
        if let Some(secret) = matches.get_one::<String>("secret-key") {
            self.secret_key = Some(secret.clone());
        }
        if let Some(maintainer) = matches.get_one::<String>("maintainer") {
            self.maintainer = Some(Address::from_str(maintainer).map_err(|e| e.to_string())?);
        }
        if let Some(project_id) = matches.get_one::<u32>("project") {
            self.project_id = *project_id;
        }
        if let Some(min_votes) = matches.get_one::<usize>("min-votes") {
            self.min_votes = *min_votes;
        }
        Ok(self)
    }

    /// The signing key, or exit if none was given
    pub fn signer(&self) -> Ed25519Signer {
        let secret = self.secret_key.as_deref().unwrap_or_else(|| {
            eprintln!(
                "Please provide a secret key either via --secret-key or DISPUTEBALLOT_SECRET_KEY"
            );
            std::process::exit(1);
        });
        Ed25519Signer::from_secret_hex(secret).unwrap_or_else(|e| crate::fail("signer", e))
    }

    /// The configured maintainer, or the signer's own address
    pub fn maintainer_or(&self, signer: &Ed25519Signer) -> Address {
        use disputeballot::TransactionSigner;

        self.maintainer
            .clone()
            .unwrap_or_else(|| signer.address().clone())
    }

    /// Coordinator settings for commands that sign. Without an explicit
    /// maintainer, `signer` is assumed to be it.
    pub fn coordinator(&self, signer: &Ed25519Signer) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::new(self.maintainer_or(signer));
        config.min_votes = self.min_votes;
        config
    }

    /// Coordinator settings for commands that only read
    pub fn read_only_coordinator(&self) -> CoordinatorConfig {
        let mut config = match &self.maintainer {
            Some(maintainer) => CoordinatorConfig::new(maintainer.clone()),
            None => CoordinatorConfig::read_only(),
        };
        config.min_votes = self.min_votes;
        config
    }
}

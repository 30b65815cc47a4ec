use crate::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

#[derive(Serialize, Debug)]
struct SimulateRequest<'a> {
    method: &'a str,
    args: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct SimulateResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

/// Ledger client for a JSON gateway in front of the dispute contract.
///
/// Reads are `POST {base}/simulate`, writes `POST {base}/transactions`, and
/// confirmation polls `GET {base}/transactions/{hash}`.
#[derive(Clone, Debug)]
pub struct RpcLedger {
    client: reqwest::Client,
    base_uri: String,
}

impl RpcLedger {
    pub fn new(base_uri: &str) -> Self {
        RpcLedger::with_client(reqwest::Client::new(), base_uri)
    }

    pub fn with_client(client: reqwest::Client, base_uri: &str) -> Self {
        RpcLedger {
            client,
            base_uri: base_uri.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_uri, path)
    }

    /// Run a read-only simulation. `Ok(None)` means the ledger returned no value.
    async fn simulate<T: DeserializeOwned>(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<Option<T>, LedgerError> {
        let request = SimulateRequest { method, args };
        let response: SimulateResponse<T> = self
            .client
            .post(self.url("simulate"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.error {
            Some(reason) => Err(LedgerError::Simulation {
                method: method.to_owned(),
                reason,
            }),
            None => Ok(response.result),
        }
    }

    async fn simulate_value<T: DeserializeOwned>(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<T, LedgerError> {
        self.simulate(method, args).await?.ok_or_else(|| {
            LedgerError::UnexpectedResponse(format!("simulation of {} returned no result", method))
        })
    }
}

fn decimal_strings(values: &[u128; NUM_CHOICES]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[async_trait]
impl CommitmentOracle for RpcLedger {
    async fn build_commitments(
        &self,
        project_id: u32,
        votes: &[u128; NUM_CHOICES],
        seeds: &[u128; NUM_CHOICES],
    ) -> Result<Vec<Commitment>, OracleError> {
        let args = json!({
            "project_id": project_id,
            "votes": decimal_strings(votes),
            "seeds": decimal_strings(seeds),
        });
        self.simulate_value("build_commitments_from_votes", args)
            .await
            .map_err(|e| OracleError::CommitmentRequest(e.to_string()))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_dispute(&self, dispute_id: u32) -> Result<Dispute, LedgerError> {
        self.simulate("get_dispute", json!({ "dispute_id": dispute_id }))
            .await?
            .ok_or(LedgerError::DisputeNotFound(dispute_id))
    }

    async fn get_anonymous_voting_config(
        &self,
        project_id: u32,
    ) -> Result<AnonymousVotingConfig, LedgerError> {
        self.simulate(
            "get_anonymous_voting_config",
            json!({ "project_id": project_id }),
        )
        .await?
        .ok_or(LedgerError::NoVotingConfig(project_id))
    }

    async fn get_dispute_count(&self) -> Result<u32, LedgerError> {
        self.simulate_value("get_dispute_count", json!({})).await
    }

    async fn proof(&self, dispute_id: u32, reveal: &Reveal) -> Result<bool, LedgerError> {
        let args = json!({
            "dispute_id": dispute_id,
            "tallies": decimal_strings(&reveal.tallies),
            "seeds": decimal_strings(&reveal.seeds),
        });
        self.simulate_value("proof", args).await
    }

    async fn send_transaction(&self, call: SignedCall) -> Result<Submission, LedgerError> {
        debug!("sending {} signed by {}", call.call.method(), call.signer);
        let submission = self
            .client
            .post(self.url("transactions"))
            .json(&call)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(submission)
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxReceipt, LedgerError> {
        let receipt = self
            .client
            .get(self.url(&format!("transactions/{}", hash)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(receipt)
    }
}

//! Nonblocking RPC client utilities for signing, sending and confirming DAO transactions.

use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use dao_interface::Discriminator;
use solana_account::Account;
use solana_address::Address;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{
        RpcAccountInfoConfig,
        RpcProgramAccountsConfig,
        UiAccountEncoding,
    },
    rpc_filter::{
        Memcmp,
        RpcFilterType,
    },
};
use solana_commitment_config::CommitmentConfig;
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::{
    hash::Hash,
    message::{
        Instruction,
        Message,
    },
    signature::{
        Keypair,
        Signature,
        Signer,
    },
    transaction::Transaction,
};
use tokio::time::{
    sleep,
    Instant,
};

use crate::{
    connection::DaoConnection,
    logs::log_program_logs,
    print_kv,
    rejection::Rejection,
    LogColor,
};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8899";

const CLOCK_SYSVAR_ID: Address = solana_sdk::pubkey!("SysvarC1ock11111111111111111111111111111111");

/// `unix_timestamp` follows `slot`, `epoch_start_timestamp`, `epoch` and `leader_schedule_epoch`.
const CLOCK_UNIX_TIMESTAMP_OFFSET: usize = 32;

/// Reads the cluster time from the clock sysvar's account data.
fn clock_unix_timestamp(data: &[u8]) -> anyhow::Result<i64> {
    let bytes = data
        .get(CLOCK_UNIX_TIMESTAMP_OFFSET..CLOCK_UNIX_TIMESTAMP_OFFSET + 8)
        .context("Clock sysvar data is too short")?;
    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(timestamp))
}

pub struct CustomRpcClient {
    pub client: RpcClient,
    pub config: SendTransactionConfig,
}

impl Default for CustomRpcClient {
    fn default() -> Self {
        CustomRpcClient::new_from_url(DEFAULT_RPC_URL, Default::default())
    }
}

impl CustomRpcClient {
    pub fn new_from_url(url: &str, config: SendTransactionConfig) -> Self {
        CustomRpcClient {
            client: RpcClient::new_with_commitment(url.into(), CommitmentConfig::confirmed()),
            config,
        }
    }

    pub async fn send_and_confirm_txn(
        &self,
        payer: &Keypair,
        signers: &[&Keypair],
        instructions: &[Instruction],
    ) -> anyhow::Result<Signature> {
        submit(self, payer, signers, instructions).await
    }
}

#[derive(Clone, Debug)]
pub struct SendTransactionConfig {
    /// Prepends compute budget instructions with this unit limit when set.
    pub compute_budget: Option<u32>,
    pub debug_logs: Option<bool>,
    pub confirm_poll_interval: Duration,
    /// How long to poll for confirmation before re-sending or giving up.
    pub confirm_timeout: Duration,
    /// How many times the same signed transaction is re-sent after a confirmation timeout.
    pub resend_attempts: u8,
}

impl Default for SendTransactionConfig {
    fn default() -> Self {
        SendTransactionConfig {
            compute_budget: None,
            debug_logs: Some(true),
            confirm_poll_interval: Duration::from_millis(500),
            confirm_timeout: Duration::from_secs(30),
            resend_attempts: 1,
        }
    }
}

impl SendTransactionConfig {
    pub fn debug_logs(&self) -> bool {
        matches!(self.debug_logs, Some(true))
    }
}

/// The transaction was sent but never confirmed within the configured timeout, including re-sends.
///
/// It may still land later; re-sending the same signed transaction can't apply it twice.
#[derive(Debug)]
pub struct ConfirmationTimeout {
    pub signature: Signature,
    pub attempts: u8,
}

impl core::fmt::Display for ConfirmationTimeout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Transaction {} wasn't confirmed after {} attempt(s)",
            self.signature, self.attempts
        )
    }
}

impl std::error::Error for ConfirmationTimeout {}

/// Builds one transaction for all `instructions`, paid for by `payer` and signed by `payer` and
/// every extra signer.
pub async fn sign_transaction<C: DaoConnection>(
    conn: &C,
    payer: &Keypair,
    signers: &[&Keypair],
    instructions: &[Instruction],
) -> anyhow::Result<Transaction> {
    let blockhash = conn
        .latest_blockhash()
        .await
        .context("Couldn't fetch a recent blockhash")?;

    let final_instructions: &[Instruction] = &[
        conn.config().compute_budget.map_or(vec![], |budget| {
            vec![
                ComputeBudgetInstruction::set_compute_unit_limit(budget),
                ComputeBudgetInstruction::set_compute_unit_price(1),
            ]
        }),
        instructions.to_vec(),
    ]
    .concat();

    let msg = Message::new(final_instructions, Some(&payer.pubkey()));
    let mut tx = Transaction::new_unsigned(msg);
    tx.try_sign(
        &[std::iter::once(payer)
            .chain(signers.iter().cloned())
            .collect::<Vec<_>>()]
        .concat(),
        blockhash,
    )
    .context("Couldn't sign transaction")?;

    Ok(tx)
}

/// Polls until `transaction` is confirmed.
///
/// After each timeout the same signed transaction is re-sent, up to the configured number of
/// attempts. A transaction that lands but fails is returned as a [`Rejection`] error.
pub async fn confirm_transaction<C: DaoConnection>(
    conn: &C,
    transaction: &Transaction,
    signature: &Signature,
) -> anyhow::Result<()> {
    let config = conn.config();
    for attempt in 0..=config.resend_attempts {
        if attempt > 0 {
            if config.debug_logs() {
                print_kv!("Re-sending", signature, LogColor::Warning);
            }
            // The first send may already have landed, so a failed re-send only means polling
            // continues.
            if let Err(err) = conn.send_transaction(transaction).await {
                if config.debug_logs() {
                    print_kv!("Re-send failed", format!("{err:#}"), LogColor::Warning);
                }
            }
        }

        let started = Instant::now();
        loop {
            if let Some(status) = conn.signature_status(signature).await? {
                return status.map_err(Into::into);
            }
            if started.elapsed() >= config.confirm_timeout {
                break;
            }
            sleep(config.confirm_poll_interval).await;
        }
    }

    Err(ConfirmationTimeout {
        signature: *signature,
        attempts: config.resend_attempts + 1,
    }
    .into())
}

/// Signs, sends and confirms `instructions` as one atomic transaction.
///
/// Not idempotent: a caller that retries after a failure builds and signs a new transaction.
pub async fn submit<C: DaoConnection>(
    conn: &C,
    payer: &Keypair,
    signers: &[&Keypair],
    instructions: &[Instruction],
) -> anyhow::Result<Signature> {
    let tx = sign_transaction(conn, payer, signers, instructions).await?;
    let signature = conn.send_transaction(&tx).await.inspect_err(|err| {
        log_failure(conn.config(), payer, err);
    })?;
    confirm_transaction(conn, &tx, &signature)
        .await
        .inspect_err(|err| log_failure(conn.config(), payer, err))?;

    Ok(signature)
}

fn log_failure(config: &SendTransactionConfig, payer: &Keypair, error: &anyhow::Error) {
    if !config.debug_logs() {
        return;
    }
    print_kv!("Transaction failed", error, LogColor::Error);
    print_kv!("Payer", payer.pubkey(), LogColor::Error);
    if let Some(rejection) = error.downcast_ref::<Rejection>() {
        log_program_logs(&rejection.logs);
    }
}

impl DaoConnection for CustomRpcClient {
    fn config(&self) -> &SendTransactionConfig {
        &self.config
    }

    async fn fetch_account(&self, address: &Address) -> anyhow::Result<Option<Account>> {
        Ok(self
            .client
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .context("Couldn't retrieve account data")?
            .value)
    }

    async fn fetch_program_accounts(
        &self,
        program_id: &Address,
        discriminator: &Discriminator,
    ) -> anyhow::Result<Vec<(Address, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                0,
                discriminator.to_vec(),
            ))]),
            account_config: RpcAccountInfoConfig {
                commitment: Some(CommitmentConfig::confirmed()),
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: None,
                min_context_slot: None,
            },
            with_context: Some(true),
            sort_results: Some(true),
        };

        self.client
            .get_program_accounts_with_config(program_id, config)
            .await
            .context("Couldn't retrieve program accounts")
    }

    async fn unix_timestamp(&self) -> anyhow::Result<i64> {
        let clock = self
            .client
            .get_account_with_commitment(&CLOCK_SYSVAR_ID, CommitmentConfig::confirmed())
            .await
            .context("Couldn't fetch the clock sysvar")?
            .value
            .context("Clock sysvar doesn't exist")?;
        clock_unix_timestamp(&clock.data)
    }

    async fn latest_blockhash(&self) -> anyhow::Result<Hash> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> anyhow::Result<Signature> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(|err| match Rejection::from_client_error(&err) {
                Some(rejection) => rejection.into(),
                None => anyhow::Error::new(err).context("Failed transaction submission"),
            })
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> anyhow::Result<Option<Result<(), Rejection>>> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.client.commitment())
            .await
            .context("Couldn't fetch signature status")?;

        Ok(status.map(|result| result.map_err(|err| Rejection::from_transaction_error(&err))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_unix_timestamp_from_clock_data() {
        let mut data = vec![];
        data.extend_from_slice(&250_000_000u64.to_le_bytes());
        data.extend_from_slice(&1_699_990_000i64.to_le_bytes());
        data.extend_from_slice(&578u64.to_le_bytes());
        data.extend_from_slice(&579u64.to_le_bytes());
        data.extend_from_slice(&1_700_000_000i64.to_le_bytes());

        assert_eq!(clock_unix_timestamp(&data).unwrap(), 1_700_000_000);
        assert!(clock_unix_timestamp(&data[..39]).is_err());
    }
}

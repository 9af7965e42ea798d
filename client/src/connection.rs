//! The seam between the client and a cluster: everything the orchestrator, views and scripts need
//! from a connection, implemented over RPC by [`crate::transactions::CustomRpcClient`] and in
//! memory by [`crate::mock_helpers::MockDao`].

use dao_interface::Discriminator;
use solana_account::Account;
use solana_address::Address;
use solana_sdk::{
    hash::Hash,
    signature::Signature,
    transaction::Transaction,
};

use crate::{
    rejection::Rejection,
    transactions::SendTransactionConfig,
};

#[allow(async_fn_in_trait)]
pub trait DaoConnection {
    fn config(&self) -> &SendTransactionConfig;

    async fn fetch_account(&self, address: &Address) -> anyhow::Result<Option<Account>>;

    /// Every account owned by `program_id` whose data starts with `discriminator`.
    async fn fetch_program_accounts(
        &self,
        program_id: &Address,
        discriminator: &Discriminator,
    ) -> anyhow::Result<Vec<(Address, Account)>>;

    /// The cluster's current unix timestamp, as the program's clock would report it.
    async fn unix_timestamp(&self) -> anyhow::Result<i64>;

    async fn latest_blockhash(&self) -> anyhow::Result<Hash>;

    /// Sends a signed transaction. A refusal by the cluster is returned as a [`Rejection`] error.
    async fn send_transaction(&self, transaction: &Transaction) -> anyhow::Result<Signature>;

    /// `None` until the transaction is confirmed, then whether it succeeded.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> anyhow::Result<Option<Result<(), Rejection>>>;

    async fn account_exists(&self, address: &Address) -> anyhow::Result<bool> {
        Ok(self.fetch_account(address).await?.is_some())
    }
}

//! Read-only view helpers for decoding the DAO program's on-chain accounts.

use anyhow::{
    bail,
    Context,
};
use dao_interface::{
    descriptor::{
        names,
        DAO_DESCRIPTOR,
    },
    state::{
        DaoConfig,
        Proposal,
    },
};
use itertools::Itertools;
use solana_account::Account;
use solana_address::Address;

use crate::{
    connection::DaoConnection,
    pda::find_config_address,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigView {
    pub address: Address,
    pub dao_token_mint: Address,
}

/// A decoded proposal together with the address it lives at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalView {
    pub address: Address,
    pub proposal: Proposal,
}

fn check_owner(address: &Address, account: &Account) -> anyhow::Result<()> {
    if account.owner != DAO_DESCRIPTOR.program_id {
        bail!("Account {address} isn't owned by the DAO program");
    }
    Ok(())
}

/// Returns `None` if the DAO hasn't been initialized yet.
pub async fn fetch_config<C: DaoConnection>(conn: &C) -> anyhow::Result<Option<ConfigView>> {
    let (address, _bump) = find_config_address();
    let Some(account) = conn.fetch_account(&address).await? else {
        return Ok(None);
    };
    check_owner(&address, &account)?;
    let config = DaoConfig::try_from_account_data(&account.data)
        .with_context(|| format!("Couldn't decode config account {address}"))?;

    Ok(Some(ConfigView {
        address,
        dao_token_mint: config.dao_token_mint,
    }))
}

pub async fn fetch_proposal<C: DaoConnection>(
    conn: &C,
    address: &Address,
) -> anyhow::Result<ProposalView> {
    let account = conn
        .fetch_account(address)
        .await?
        .with_context(|| format!("Proposal {address} doesn't exist"))?;
    try_proposal_view(*address, &account)
}

/// Fetches every proposal account owned by the program, ordered by start time.
pub async fn fetch_proposals<C: DaoConnection>(conn: &C) -> anyhow::Result<Vec<ProposalView>> {
    let schema = DAO_DESCRIPTOR.account(names::PROPOSAL)?;
    let accounts = conn
        .fetch_program_accounts(&DAO_DESCRIPTOR.program_id, &schema.discriminator)
        .await?;

    accounts
        .iter()
        .map(|(address, account)| try_proposal_view(*address, account))
        .process_results(|views| {
            views
                .sorted_by_key(|view| (view.proposal.start_time, view.address))
                .collect()
        })
}

fn try_proposal_view(address: Address, account: &Account) -> anyhow::Result<ProposalView> {
    check_owner(&address, account)?;
    let proposal = Proposal::try_from_account_data(&account.data)
        .with_context(|| format!("Couldn't decode proposal account {address}"))?;
    Ok(ProposalView { address, proposal })
}

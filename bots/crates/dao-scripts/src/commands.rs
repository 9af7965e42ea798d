//! One function per subcommand. Each prints what it did and fails with the reason an action was
//! rejected.

use anyhow::{
    bail,
    Context,
};
use chrono::DateTime;
use client::{
    actions::{
        ActionRunner,
        ActionStage,
    },
    board::ProposalBoard,
    connection::DaoConnection,
    context::token::TokenContext,
    forms::ProposalForm,
    logs::{
        log_divider,
        log_header,
    },
    pda::find_config_address,
    print_kv,
    transactions::CustomRpcClient,
    views::{
        fetch_config,
        fetch_proposal,
        fetch_proposals,
        ProposalView,
    },
    LogColor,
};
use colored::Colorize;
use itertools::Itertools;
use solana_address::Address;
use solana_sdk::{
    signature::{
        Keypair,
        Signature,
    },
    signer::Signer,
};

use crate::{
    cli::parse_time,
    config::{
        DAO_MINT_DECIMALS,
        DEFAULT_VOTING_PERIOD_SECS,
        INIT_MINT_AMOUNT,
    },
};

fn finish(stage: ActionStage) -> anyhow::Result<Signature> {
    match stage {
        ActionStage::Succeeded(signature) => Ok(signature),
        ActionStage::Failed(failure) => match failure.unconfirmed {
            Some(signature) => bail!("{failure}. Check {signature} before retrying"),
            None => bail!("{failure}"),
        },
        stage => bail!("Action stopped at {stage:?}"),
    }
}

fn fmt_time(unix_timestamp: i64) -> String {
    DateTime::from_timestamp(unix_timestamp, 0)
        .map_or_else(|| unix_timestamp.to_string(), |date| date.to_rfc2822())
}

fn print_proposal(index: usize, view: &ProposalView, now: i64) {
    let proposal = &view.proposal;
    log_header(&format!("Proposal #{}", index + 1));
    print_kv!("Public Key", view.address);
    print_kv!("Creator", proposal.creator);
    print_kv!("Title", proposal.title);
    print_kv!("Description", proposal.description);
    print_kv!("Options", proposal.options.iter().join(", "));
    print_kv!("Start Time", fmt_time(proposal.start_time));
    print_kv!("End Time", fmt_time(proposal.end_time));
    print_kv!(
        "Votes",
        view.tallies()
            .map(|(label, votes)| format!("{label}: {votes}"))
            .join(", ")
    );
    print_kv!("Winner", view.winner_status(now), LogColor::Info);
}

pub async fn init(rpc: &CustomRpcClient, wallet: &Keypair) -> anyhow::Result<()> {
    log_header("Initializing DAO");
    let token = TokenContext::create_new_from_mint(
        rpc,
        wallet.insecure_clone(),
        Keypair::new(),
        DAO_MINT_DECIMALS,
    )
    .await
    .context("Couldn't create the DAO token mint")?;
    print_kv!("DAO Token Mint", token.mint_address);
    print_kv!("Config PDA", find_config_address().0);

    let owner = wallet.pubkey();
    rpc.send_and_confirm_txn(
        wallet,
        &[],
        &[
            token.create_ata_instruction(&owner, &owner),
            token.mint_to_instruction(&owner, INIT_MINT_AMOUNT)?,
        ],
    )
    .await?;
    print_kv!(
        "Minted",
        format!("{INIT_MINT_AMOUNT} DAO tokens to {}", token.get_ata_for(&owner))
    );

    finish(
        ActionRunner::new(rpc)?
            .initialize(wallet, token.mint_address)
            .await,
    )?;

    let config = fetch_config(rpc)
        .await?
        .context("Config account wasn't created")?;
    if config.dao_token_mint != token.mint_address {
        bail!(
            "Config holds mint {} instead of {}",
            config.dao_token_mint,
            token.mint_address
        );
    }
    print_kv!("DAO initialized", config.address, LogColor::Header);
    Ok(())
}

pub async fn create_proposal(
    rpc: &CustomRpcClient,
    wallet: &Keypair,
    title: &str,
    description: &str,
    options: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let now = rpc.unix_timestamp().await?;
    let start = start.map_or_else(|| now.to_string(), parse_time);
    let end = match end {
        Some(end) => parse_time(end),
        None => {
            let start_time = start.parse::<i64>().unwrap_or(now);
            (start_time + DEFAULT_VOTING_PERIOD_SECS).to_string()
        }
    };
    let form = ProposalForm::parse(title, description, options, &start, &end)?;

    let proposal = Keypair::new();
    finish(
        ActionRunner::new(rpc)?
            .create_proposal(wallet, &proposal, &form)
            .await,
    )?;

    let view = fetch_proposal(rpc, &proposal.pubkey()).await?;
    print_proposal(0, &view, now);
    Ok(())
}

pub async fn vote(
    rpc: &CustomRpcClient,
    wallet: &Keypair,
    proposal: Option<Address>,
    option_index: usize,
) -> anyhow::Result<()> {
    let proposal = match proposal {
        Some(address) => address,
        None => fetch_proposals(rpc)
            .await?
            .first()
            .map(|view| view.address)
            .context("There are no proposals to vote on")?,
    };

    finish(
        ActionRunner::new(rpc)?
            .vote(wallet, &proposal, option_index)
            .await,
    )?;

    let (view, now) = fetch_with_time(rpc, &proposal).await?;
    print_proposal(0, &view, now);
    print_kv!(
        "Your option now has",
        view.proposal.vote_count(option_index).unwrap_or_default(),
        LogColor::Header
    );
    Ok(())
}

pub async fn tally(rpc: &CustomRpcClient, wallet: &Keypair, proposal: Address) -> anyhow::Result<()> {
    finish(ActionRunner::new(rpc)?.tally(wallet, &proposal).await)?;

    let (view, now) = fetch_with_time(rpc, &proposal).await?;
    print_proposal(0, &view, now);
    Ok(())
}

async fn fetch_with_time(
    rpc: &CustomRpcClient,
    proposal: &Address,
) -> anyhow::Result<(ProposalView, i64)> {
    Ok((
        fetch_proposal(rpc, proposal).await?,
        rpc.unix_timestamp().await?,
    ))
}

pub async fn fetch_all_proposals(rpc: &CustomRpcClient, wallet: &Keypair) -> anyhow::Result<()> {
    let mut board = ProposalBoard::new();
    board.refresh(rpc).await?;
    let now = board.refreshed_at().unwrap_or_default();

    if board.proposals().is_empty() {
        print_kv!("Proposals", "none", LogColor::Warning);
        return Ok(());
    }
    for (index, view) in board.proposals().iter().enumerate() {
        print_proposal(index, view, now);
    }

    let voter = wallet.pubkey();
    log_divider();
    print_kv!(
        "Open for your vote",
        board.votable(now, &voter).map(|view| view.address).join(", "),
        LogColor::Info
    );
    print_kv!(
        "Awaiting tally",
        board.awaiting_tally(now).map(|view| view.address).join(", "),
        LogColor::Info
    );
    Ok(())
}

pub async fn mint_tokens(
    rpc: &CustomRpcClient,
    wallet: &Keypair,
    mint: Address,
    recipient: Address,
    amount: u64,
) -> anyhow::Result<()> {
    let token = TokenContext::new_from_existing(rpc, mint, Some(wallet.insecure_clone())).await?;
    let owner = wallet.pubkey();

    let mut instructions = vec![];
    for holder in [owner, recipient] {
        if !rpc.account_exists(&token.get_ata_for(&holder)).await? {
            instructions.push(token.create_ata_instruction(&owner, &holder));
        }
    }
    instructions.push(token.mint_to_instruction(&owner, amount)?);
    instructions.push(token.transfer_instruction(&owner, &recipient, amount)?);

    rpc.send_and_confirm_txn(wallet, &[], &instructions).await?;

    print_kv!("Minted", amount);
    print_kv!("Transferred to", recipient);
    print_kv!(
        "Recipient balance",
        token.get_balance_for(rpc, &recipient).await?,
        LogColor::Info
    );
    Ok(())
}

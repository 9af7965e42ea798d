//! Operational scripts for the DAO voting program: setup, proposals, voting and token funding.

use clap::Parser;
use client::{
    print_kv,
    transactions::{
        CustomRpcClient,
        SendTransactionConfig,
    },
    LogColor,
};
use colored::Colorize;
use solana_sdk::signer::Signer;

use crate::cli::{
    CliArgs,
    Command,
};

pub mod cli;
pub mod commands;
pub mod config;
pub mod load_env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let CliArgs { url, command } = CliArgs::parse();

    let rpc = CustomRpcClient::new_from_url(
        &url,
        SendTransactionConfig {
            debug_logs: Some(true),
            ..Default::default()
        },
    );
    let wallet = load_env::wallet_keypair()?;
    print_kv!("RPC", url, LogColor::Info);
    print_kv!("Wallet", wallet.pubkey(), LogColor::Info);

    match command {
        Command::Init => commands::init(&rpc, &wallet).await,
        Command::CreateProposal {
            title,
            description,
            options,
            start,
            end,
        } => {
            commands::create_proposal(
                &rpc,
                &wallet,
                &title,
                &description,
                &options,
                start.as_deref(),
                end.as_deref(),
            )
            .await
        }
        Command::Vote { proposal, option } => {
            commands::vote(&rpc, &wallet, proposal, option).await
        }
        Command::Tally { proposal } => commands::tally(&rpc, &wallet, proposal).await,
        Command::FetchProposals => commands::fetch_all_proposals(&rpc, &wallet).await,
        Command::MintTokens {
            mint,
            recipient,
            amount,
        } => commands::mint_tokens(&rpc, &wallet, mint, recipient, amount).await,
    }
}

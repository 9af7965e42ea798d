use chrono::DateTime;
use clap::{
    Parser,
    Subcommand,
};
use solana_address::Address;

use crate::config::{
    DEFAULT_DAO_MINT,
    DEVNET_URL,
};

#[derive(Parser)]
#[command(name = "dao-scripts")]
pub struct CliArgs {
    /// RPC endpoint of the cluster the DAO program is deployed on.
    #[arg(short = 'u', long, default_value = DEVNET_URL)]
    pub url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Creates a fresh voting token mint, funds the wallet and initializes the DAO with it.
    Init,

    /// Creates a proposal from the wallet, which must hold a DAO token account.
    CreateProposal {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: String,

        /// Comma-separated option labels.
        #[arg(short, long, default_value = "Yes,No")]
        options: String,

        /// Unix seconds or an RFC 3339 date. Defaults to the cluster's current time.
        #[arg(long)]
        start: Option<String>,

        /// Unix seconds or an RFC 3339 date. Defaults to seven days after the start.
        #[arg(long)]
        end: Option<String>,
    },

    /// Votes with the wallet's full token balance.
    Vote {
        /// Defaults to the proposal that starts first.
        #[arg(short, long)]
        proposal: Option<Address>,

        /// Zero-based index of the chosen option.
        #[arg(long)]
        option: usize,
    },

    /// Records the winner of a proposal whose voting period has ended.
    Tally {
        #[arg(short, long)]
        proposal: Address,
    },

    /// Prints every proposal the program owns.
    FetchProposals,

    /// Mints voting tokens to the wallet and transfers them to `recipient`.
    MintTokens {
        #[arg(short, long, default_value_t = DEFAULT_DAO_MINT)]
        mint: Address,

        #[arg(short, long)]
        recipient: Address,

        #[arg(short, long, default_value_t = 1000)]
        amount: u64,
    },
}

/// Converts an RFC 3339 date to unix seconds. Anything else is passed through unchanged and left
/// for the proposal form to validate.
pub fn parse_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(date) => date.timestamp().to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_subcommands_with_defaults() {
        let args = CliArgs::try_parse_from([
            "dao-scripts",
            "create-proposal",
            "--title",
            "Treasury",
            "--description",
            "Allocate 50%",
        ])
        .unwrap();
        assert_eq!(args.url, DEVNET_URL);
        let Command::CreateProposal {
            options,
            start,
            end,
            ..
        } = args.command
        else {
            panic!("Expected create-proposal");
        };
        assert_eq!(options, "Yes,No");
        assert_eq!((start, end), (None, None));

        let recipient = Address::new_unique();
        let args = CliArgs::try_parse_from([
            "dao-scripts",
            "--url",
            "http://localhost:8899",
            "mint-tokens",
            "--recipient",
            &recipient.to_string(),
        ])
        .unwrap();
        assert_eq!(args.url, "http://localhost:8899");
        assert!(matches!(
            args.command,
            Command::MintTokens { mint, recipient: r, amount: 1000 }
                if mint == DEFAULT_DAO_MINT && r == recipient
        ));
    }

    #[test]
    fn vote_requires_an_option() {
        assert!(CliArgs::try_parse_from(["dao-scripts", "vote"]).is_err());
    }

    #[test]
    fn times_accept_unix_seconds_and_dates() {
        assert_eq!(parse_time(" 1700000000 "), "1700000000");
        assert_eq!(parse_time("2023-11-14T22:13:20Z"), "1700000000");
        assert_eq!(parse_time("tomorrow"), "tomorrow");
    }
}

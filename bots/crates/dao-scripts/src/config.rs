use solana_address::Address;

pub const DEVNET_URL: &str = "https://api.devnet.solana.com";

/// The voting token mint of the DAO deployed on devnet.
pub const DEFAULT_DAO_MINT: Address =
    solana_sdk::pubkey!("JD66mR6ivFqiT3b1MyWMjV8XvRr8Z3LBbGGLpgndbE1P");

/// Tokens minted to the wallet when a fresh DAO is initialized.
pub const INIT_MINT_AMOUNT: u64 = 100;

pub const DAO_MINT_DECIMALS: u8 = 0;

pub const DEFAULT_VOTING_PERIOD_SECS: i64 = 7 * 24 * 60 * 60;

pub const WALLET_ENV_VAR: &str = "DAO_WALLET_SECRET_KEY";

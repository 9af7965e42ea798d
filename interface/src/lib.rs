//! Public interface layer for the external DAO voting program: the static program descriptor,
//! the argument/account codec, derived-address seeds, decoded state, and error types shared by the
//! client and the operational scripts.

pub mod descriptor;
pub mod error;
pub mod instructions;
pub mod pack;
pub mod seeds;
pub mod state;

pub mod program {
    use solana_address::Address;

    pub const ID: Address = solana_sdk::pubkey!("4bcdBwQkcDYPpa8hq3Xn4uv1BNLKJa6mwq3KwpKE5hvf");
}

pub const SYSTEM_PROGRAM_ID: solana_address::Address = solana_system_interface::program::ID;
pub const TOKEN_PROGRAM_ID: solana_address::Address = spl_token_interface::ID;

/// The byte length of every instruction and account discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

pub type Discriminator = [u8; DISCRIMINATOR_LEN];

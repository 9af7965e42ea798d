use dao_interface::seeds;
use solana_address::Address;
use spl_associated_token_account_interface::address::get_associated_token_address;

/// The DAO's config account, derived from the `dao-config` seed under the program id.
pub fn find_config_address() -> (Address, u8) {
    seeds::dao_config::find_address(&dao_interface::program::ID)
}

/// The associated token account that holds `owner`'s balance of the DAO token `mint`.
pub fn find_voter_token_account(owner: &Address, mint: &Address) -> Address {
    get_associated_token_address(owner, mint)
}

//! Seeds and derivation helpers for the program's derived addresses.

use solana_address::Address;
use solana_pubkey::Pubkey;

pub const DAO_CONFIG_SEED: &[u8] = b"dao-config";

/// Derives the program address for `seeds` under `program_id`, returning the address and its bump.
///
/// Delegates to the runtime's canonical bump search so the result always equals the address the
/// program itself checks against. Pure: identical inputs always produce the identical address.
pub fn derive(seeds: &[&[u8]], program_id: &Address) -> (Address, u8) {
    Pubkey::find_program_address(seeds, program_id)
}

pub mod dao_config {
    use solana_address::Address;

    use super::{
        derive,
        DAO_CONFIG_SEED,
    };

    /// The governance-wide config account of the DAO program deployed at `program_id`.
    pub fn find_address(program_id: &Address) -> (Address, u8) {
        derive(&[DAO_CONFIG_SEED], program_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let program_id = crate::program::ID;
        let first = derive(&[DAO_CONFIG_SEED], &program_id);
        for _ in 0..8 {
            assert_eq!(derive(&[DAO_CONFIG_SEED], &program_id), first);
        }
        assert_eq!(dao_config::find_address(&program_id), first);
    }

    #[test]
    fn bump_recreates_derived_address() {
        let (address, bump) = dao_config::find_address(&crate::program::ID);
        let recreated =
            Pubkey::create_program_address(&[DAO_CONFIG_SEED, &[bump]], &crate::program::ID)
                .expect("Canonical bump should produce an off-curve address");
        assert_eq!(recreated, address);
    }

    #[test]
    fn seeds_and_program_id_both_matter() {
        let program_id = crate::program::ID;
        let other_program = Address::new_unique();
        assert_ne!(
            derive(&[DAO_CONFIG_SEED], &program_id).0,
            derive(&[DAO_CONFIG_SEED], &other_program).0
        );
        assert_ne!(
            derive(&[DAO_CONFIG_SEED], &program_id).0,
            derive(&[b"counter".as_ref()], &program_id).0
        );
    }
}

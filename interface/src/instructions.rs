//! Instruction building against the program descriptor: argument encoding plus account
//! resolution.

use std::collections::HashMap;

use solana_address::Address;
use solana_instruction::{
    AccountMeta,
    Instruction,
};

use crate::{
    descriptor::{
        AccountRole,
        AccountSource,
        ProgramDescriptor,
    },
    error::CodecError,
    pack::{
        pack_args,
        Value,
    },
    seeds::derive,
};

/// Caller-supplied addresses keyed by account role name, e.g. `"proposal"` or `"user"`.
pub type AccountMap<'a> = HashMap<&'a str, Address>;

impl ProgramDescriptor {
    /// Builds the instruction `name` with `args` in declaration order.
    ///
    /// The instruction data is the 8-byte discriminator followed by the packed arguments. Every
    /// account role is resolved to a concrete address: supplied roles are looked up in `accounts`,
    /// derived roles are derived from their seeds, constant roles use their fixed address. Extra
    /// entries in `accounts` are ignored.
    pub fn build_instruction(
        &self,
        name: &str,
        args: &[Value],
        accounts: &AccountMap,
    ) -> Result<Instruction, CodecError> {
        let schema = self.instruction(name)?;

        let mut data = schema.discriminator.to_vec();
        pack_args(schema.args, args, &mut data)?;

        let metas = schema
            .accounts
            .iter()
            .map(|role| {
                let address = self.resolve_account(role, accounts)?;
                Ok(match role.writable {
                    true => AccountMeta::new(address, role.signer),
                    false => AccountMeta::new_readonly(address, role.signer),
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(Instruction {
            program_id: self.program_id,
            accounts: metas,
            data,
        })
    }

    pub fn resolve_account(
        &self,
        role: &AccountRole,
        accounts: &AccountMap,
    ) -> Result<Address, CodecError> {
        match role.source {
            AccountSource::Supplied => accounts
                .get(role.name)
                .copied()
                .ok_or(CodecError::AccountResolution),
            AccountSource::Derived(seeds) => Ok(derive(seeds, &self.program_id).0),
            AccountSource::Constant(address) => Ok(address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{
            names,
            DAO_DESCRIPTOR,
        },
        seeds::dao_config,
        SYSTEM_PROGRAM_ID,
        TOKEN_PROGRAM_ID,
    };

    fn vote_accounts() -> (Address, Address, Address, AccountMap<'static>) {
        let proposal = Address::new_unique();
        let user = Address::new_unique();
        let token_account = Address::new_unique();
        let map = AccountMap::from([
            ("proposal", proposal),
            ("user", user),
            ("token_account", token_account),
        ]);
        (proposal, user, token_account, map)
    }

    #[test]
    fn data_starts_with_discriminator() {
        let (_, _, _, accounts) = vote_accounts();
        let mint = Address::new_unique();
        let cases: [(&str, Vec<Value>); 4] = [
            (names::INITIALIZE, vec![mint.into()]),
            (
                names::CREATE_PROPOSAL,
                vec![
                    "Title".into(),
                    "Description".into(),
                    vec!["Yes", "No"].into(),
                    1_700_000_000i64.into(),
                    1_700_003_600i64.into(),
                ],
            ),
            (names::VOTE, vec![1u8.into()]),
            (names::TALLY_VOTES, vec![]),
        ];
        let accounts = AccountMap::from_iter(
            accounts
                .into_iter()
                .chain([("authority", mint)]),
        );

        for (name, args) in cases {
            let ix = DAO_DESCRIPTOR
                .build_instruction(name, &args, &accounts)
                .unwrap();
            let schema = DAO_DESCRIPTOR.instruction(name).unwrap();
            assert_eq!(ix.data[..8], schema.discriminator, "{name}");
            assert_eq!(ix.program_id, crate::program::ID);
        }
    }

    #[test]
    fn vote_accounts_are_resolved_in_order() {
        let (proposal, user, token_account, accounts) = vote_accounts();
        let ix = DAO_DESCRIPTOR
            .build_instruction(names::VOTE, &[2u8.into()], &accounts)
            .unwrap();

        assert_eq!(ix.data, [227, 110, 155, 23, 136, 126, 172, 25, 2]);
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(proposal, false),
                AccountMeta::new(user, true),
                AccountMeta::new_readonly(dao_config::find_address(&crate::program::ID).0, false),
                AccountMeta::new_readonly(token_account, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ]
        );
    }

    #[test]
    fn missing_supplied_account_fails_resolution() {
        let (_, _, _, mut accounts) = vote_accounts();
        accounts.remove("token_account");
        assert_eq!(
            DAO_DESCRIPTOR.build_instruction(names::VOTE, &[0u8.into()], &accounts),
            Err(CodecError::AccountResolution)
        );
    }

    #[test]
    fn mismatched_args_fail_before_resolution() {
        let accounts = AccountMap::new();
        assert_eq!(
            DAO_DESCRIPTOR.build_instruction(names::VOTE, &[0u64.into()], &accounts),
            Err(CodecError::SchemaMismatch)
        );
        assert_eq!(
            DAO_DESCRIPTOR.build_instruction(names::TALLY_VOTES, &[0u8.into()], &accounts),
            Err(CodecError::SchemaMismatch)
        );
        assert_eq!(
            DAO_DESCRIPTOR.build_instruction("withdraw", &[], &accounts),
            Err(CodecError::UnknownInstruction)
        );
    }
}

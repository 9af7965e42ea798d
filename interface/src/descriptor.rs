//! The static descriptor of the DAO program: every instruction's discriminator, argument schema and
//! account roles, and every account type's discriminator and field schema.
//!
//! The descriptor mirrors the deployed program byte for byte. Nothing here is derived at runtime;
//! a mismatch with the deployed program shows up as rejected instructions or mis-decoded accounts,
//! so [`load`] validates the structure once before any caller can use it.

use std::{
    collections::HashSet,
    sync::LazyLock,
};

use solana_address::Address;

use crate::{
    error::{
        CodecError,
        DescriptorError,
    },
    seeds::DAO_CONFIG_SEED,
    Discriminator,
    SYSTEM_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};

/// The primitive types the program's arguments and account fields are built from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    U8,
    I64,
    U64,
    Pubkey,
    String,
    Vec(&'static FieldType),
    Option(&'static FieldType),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Where the address for an account role comes from when building an instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccountSource {
    /// Passed in by the caller, keyed by the role name.
    Supplied,
    /// A program-derived address built from constant seeds and the program id.
    Derived(&'static [&'static [u8]]),
    /// A fixed address, e.g. the system program.
    Constant(Address),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AccountRole {
    pub name: &'static str,
    pub writable: bool,
    pub signer: bool,
    pub source: AccountSource,
}

#[derive(Debug)]
pub struct InstructionSchema {
    pub name: &'static str,
    pub discriminator: Discriminator,
    pub args: &'static [Field],
    pub accounts: &'static [AccountRole],
}

#[derive(Debug)]
pub struct AccountSchema {
    pub name: &'static str,
    pub discriminator: Discriminator,
    pub fields: &'static [Field],
}

#[derive(Debug)]
pub struct ProgramDescriptor {
    pub program_id: Address,
    pub instructions: &'static [InstructionSchema],
    pub accounts: &'static [AccountSchema],
}

pub mod names {
    pub const INITIALIZE: &str = "initialize";
    pub const CREATE_PROPOSAL: &str = "create_proposal";
    pub const VOTE: &str = "vote";
    pub const TALLY_VOTES: &str = "tally_votes";

    pub const DAO_CONFIG: &str = "DaoConfig";
    pub const PROPOSAL: &str = "Proposal";
}

impl ProgramDescriptor {
    pub fn instruction(&self, name: &str) -> Result<&InstructionSchema, CodecError> {
        self.instructions
            .iter()
            .find(|ix| ix.name == name)
            .ok_or(CodecError::UnknownInstruction)
    }

    pub fn account(&self, name: &str) -> Result<&AccountSchema, CodecError> {
        self.accounts
            .iter()
            .find(|account| account.name == name)
            .ok_or(CodecError::UnknownAccountType)
    }

    /// Checks the descriptor's internal consistency:
    /// - Instruction and account type names are unique.
    /// - No two instructions or account types share a discriminator.
    /// - Every signer role is supplied by the caller; derived and constant addresses can't sign.
    /// - Every derived role has at least one seed.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut names = HashSet::new();
        let mut discriminators: Vec<(&'static str, Discriminator)> = vec![];

        let instruction_keys = self
            .instructions
            .iter()
            .map(|ix| (ix.name, ix.discriminator));
        let account_keys = self
            .accounts
            .iter()
            .map(|account| (account.name, account.discriminator));

        for (name, discriminator) in instruction_keys.chain(account_keys) {
            if !names.insert(name) {
                return Err(DescriptorError::DuplicateName(name));
            }
            if let Some((other, _)) = discriminators.iter().find(|(_, d)| *d == discriminator) {
                return Err(DescriptorError::DuplicateDiscriminator(*other, name));
            }
            discriminators.push((name, discriminator));
        }

        for ix in self.instructions {
            for role in ix.accounts {
                match role.source {
                    AccountSource::Supplied => {}
                    _ if role.signer => {
                        return Err(DescriptorError::UnsignableRole(ix.name, role.name))
                    }
                    AccountSource::Derived(seeds) if seeds.is_empty() => {
                        return Err(DescriptorError::EmptySeeds(ix.name, role.name))
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

/// Returns the DAO program descriptor after validating it.
///
/// Validation runs once per process; every later call returns the cached outcome.
pub fn load() -> Result<&'static ProgramDescriptor, DescriptorError> {
    static VALIDATED: LazyLock<Result<(), DescriptorError>> =
        LazyLock::new(|| DAO_DESCRIPTOR.validate());

    (*VALIDATED).clone().map(|_| &DAO_DESCRIPTOR)
}

const CONFIG_SEEDS: &[&[u8]] = &[DAO_CONFIG_SEED];

const fn supplied(name: &'static str, writable: bool, signer: bool) -> AccountRole {
    AccountRole {
        name,
        writable,
        signer,
        source: AccountSource::Supplied,
    }
}

const fn constant(name: &'static str, address: Address) -> AccountRole {
    AccountRole {
        name,
        writable: false,
        signer: false,
        source: AccountSource::Constant(address),
    }
}

const fn config(writable: bool) -> AccountRole {
    AccountRole {
        name: "config",
        writable,
        signer: false,
        source: AccountSource::Derived(CONFIG_SEEDS),
    }
}

const fn field(name: &'static str, ty: FieldType) -> Field {
    Field { name, ty }
}

#[rustfmt::skip]
pub static DAO_DESCRIPTOR: ProgramDescriptor = ProgramDescriptor {
    program_id: crate::program::ID,
    instructions: &[
        InstructionSchema {
            name: names::INITIALIZE,
            discriminator: [175, 175, 109, 31, 13, 152, 155, 237],
            args: &[
                field("dao_token_mint", FieldType::Pubkey),
            ],
            accounts: &[
                config(true),
                supplied("authority", true, true),
                constant("system_program", SYSTEM_PROGRAM_ID),
            ],
        },
        InstructionSchema {
            name: names::CREATE_PROPOSAL,
            discriminator: [132, 116, 68, 174, 216, 160, 198, 22],
            args: &[
                field("title",       FieldType::String),
                field("description", FieldType::String),
                field("options",     FieldType::Vec(&FieldType::String)),
                field("start_time",  FieldType::I64),
                field("end_time",    FieldType::I64),
            ],
            accounts: &[
                supplied("proposal",      true,  true),
                supplied("user",          true,  true),
                config(false),
                supplied("token_account", false, false),
                constant("system_program", SYSTEM_PROGRAM_ID),
                constant("token_program",  TOKEN_PROGRAM_ID),
            ],
        },
        InstructionSchema {
            name: names::TALLY_VOTES,
            discriminator: [144, 82, 0, 72, 160, 132, 35, 121],
            args: &[],
            accounts: &[
                supplied("proposal", true, false),
            ],
        },
        InstructionSchema {
            name: names::VOTE,
            discriminator: [227, 110, 155, 23, 136, 126, 172, 25],
            args: &[
                field("option_index", FieldType::U8),
            ],
            accounts: &[
                supplied("proposal",      true,  false),
                supplied("user",          true,  true),
                config(false),
                supplied("token_account", false, false),
                constant("system_program", SYSTEM_PROGRAM_ID),
                constant("token_program",  TOKEN_PROGRAM_ID),
            ],
        },
    ],
    accounts: &[
        AccountSchema {
            name: names::DAO_CONFIG,
            discriminator: [55, 209, 87, 224, 30, 202, 192, 246],
            fields: &[
                field("dao_token_mint", FieldType::Pubkey),
            ],
        },
        AccountSchema {
            name: names::PROPOSAL,
            discriminator: [26, 94, 189, 187, 116, 136, 53, 33],
            fields: &[
                field("creator",      FieldType::Pubkey),
                field("title",        FieldType::String),
                field("description",  FieldType::String),
                field("options",      FieldType::Vec(&FieldType::String)),
                field("start_time",   FieldType::I64),
                field("end_time",     FieldType::I64),
                field("votes",        FieldType::Vec(&FieldType::U64)),
                field("voters",       FieldType::Vec(&FieldType::Pubkey)),
                field("winner_index", FieldType::Option(&FieldType::U8)),
            ],
        },
    ],
};

#[cfg(test)]
mod tests {
    use sha2::{
        Digest,
        Sha256,
    };

    use super::*;

    fn anchor_discriminator(namespace: &str, name: &str) -> Discriminator {
        let hash = Sha256::digest(format!("{namespace}:{name}").as_bytes());
        let mut discriminator = [0u8; 8];
        discriminator.copy_from_slice(&hash[..8]);
        discriminator
    }

    #[test]
    fn dao_descriptor_is_valid() {
        assert_eq!(DAO_DESCRIPTOR.validate(), Ok(()));
        assert!(load().is_ok());
    }

    /// The selectors are stored as constants; this only checks that the constants weren't
    /// mistyped against the deployed program's naming scheme.
    #[test]
    fn discriminators_match_anchor_hashes() {
        for ix in DAO_DESCRIPTOR.instructions {
            assert_eq!(
                ix.discriminator,
                anchor_discriminator("global", ix.name),
                "{}",
                ix.name
            );
        }
        for account in DAO_DESCRIPTOR.accounts {
            assert_eq!(
                account.discriminator,
                anchor_discriminator("account", account.name),
                "{}",
                account.name
            );
        }
    }

    #[test]
    fn lookups() {
        assert_eq!(
            DAO_DESCRIPTOR.instruction(names::VOTE).unwrap().args,
            &[field("option_index", FieldType::U8)]
        );
        assert_eq!(
            DAO_DESCRIPTOR.instruction("close_proposal").unwrap_err(),
            CodecError::UnknownInstruction
        );
        assert_eq!(
            DAO_DESCRIPTOR.account("Vote").unwrap_err(),
            CodecError::UnknownAccountType
        );
    }

    #[test]
    fn duplicate_discriminator_is_rejected() {
        static BROKEN: ProgramDescriptor = ProgramDescriptor {
            program_id: crate::program::ID,
            instructions: &[InstructionSchema {
                name: "a",
                discriminator: [1; 8],
                args: &[],
                accounts: &[],
            }],
            accounts: &[AccountSchema {
                name: "B",
                discriminator: [1; 8],
                fields: &[],
            }],
        };
        assert_eq!(
            BROKEN.validate(),
            Err(DescriptorError::DuplicateDiscriminator("a", "B"))
        );
    }

    #[test]
    fn duplicate_name_is_rejected() {
        static BROKEN: ProgramDescriptor = ProgramDescriptor {
            program_id: crate::program::ID,
            instructions: &[
                InstructionSchema {
                    name: "a",
                    discriminator: [1; 8],
                    args: &[],
                    accounts: &[],
                },
                InstructionSchema {
                    name: "a",
                    discriminator: [2; 8],
                    args: &[],
                    accounts: &[],
                },
            ],
            accounts: &[],
        };
        assert_eq!(BROKEN.validate(), Err(DescriptorError::DuplicateName("a")));
    }

    #[test]
    fn derived_role_without_seeds_is_rejected() {
        static BROKEN: ProgramDescriptor = ProgramDescriptor {
            program_id: crate::program::ID,
            instructions: &[InstructionSchema {
                name: "a",
                discriminator: [1; 8],
                args: &[],
                accounts: &[AccountRole {
                    name: "config",
                    writable: false,
                    signer: false,
                    source: AccountSource::Derived(&[]),
                }],
            }],
            accounts: &[],
        };
        assert_eq!(
            BROKEN.validate(),
            Err(DescriptorError::EmptySeeds("a", "config"))
        );
    }

    #[test]
    fn derived_signer_is_rejected() {
        static BROKEN: ProgramDescriptor = ProgramDescriptor {
            program_id: crate::program::ID,
            instructions: &[InstructionSchema {
                name: "a",
                discriminator: [1; 8],
                args: &[],
                accounts: &[AccountRole {
                    name: "config",
                    writable: true,
                    signer: true,
                    source: AccountSource::Derived(CONFIG_SEEDS),
                }],
            }],
            accounts: &[],
        };
        assert_eq!(
            BROKEN.validate(),
            Err(DescriptorError::UnsignableRole("a", "config"))
        );
    }
}

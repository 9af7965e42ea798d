//! Account decoding against the program descriptor and the typed forms of the program's two
//! account types.

use borsh::{
    BorshDeserialize,
    BorshSerialize,
};
use solana_address::Address;
use static_assertions::const_assert_eq;

use crate::{
    descriptor::{
        names,
        ProgramDescriptor,
        DAO_DESCRIPTOR,
    },
    error::CodecError,
    pack::{
        unpack_fields,
        Value,
    },
    DISCRIMINATOR_LEN,
};

/// An account's fields decoded in declaration order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedAccount {
    pub type_name: &'static str,
    pub fields: Vec<(&'static str, Value)>,
}

impl DecodedAccount {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(field, value)| (*field == name).then_some(value))
    }

    fn required(&self, name: &str) -> Result<&Value, CodecError> {
        self.field(name).ok_or(CodecError::InvalidData)
    }
}

impl ProgramDescriptor {
    /// Decodes raw account data as the account type `type_name`.
    ///
    /// The leading 8 bytes must equal the type's discriminator; otherwise this fails with
    /// [`CodecError::DiscriminatorMismatch`] before any field is read. Fields are then decoded in
    /// order, failing with [`CodecError::TruncatedData`] if the bytes run out mid-field.
    pub fn decode_account(
        &self,
        type_name: &str,
        data: &[u8],
    ) -> Result<DecodedAccount, CodecError> {
        let schema = self.account(type_name)?;
        match data.split_at_checked(DISCRIMINATOR_LEN) {
            Some((discriminator, body)) if discriminator == schema.discriminator => {
                Ok(DecodedAccount {
                    type_name: schema.name,
                    fields: unpack_fields(schema.fields, body)?,
                })
            }
            _ => Err(CodecError::DiscriminatorMismatch),
        }
    }
}

/// The governance-wide config record holding the accepted voting token mint.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct DaoConfig {
    pub dao_token_mint: Address,
}

impl DaoConfig {
    /// The space the program allocates for the account, discriminator included.
    pub const SPACE: usize = DISCRIMINATOR_LEN + 32;

    pub fn try_from_account_data(data: &[u8]) -> Result<Self, CodecError> {
        DAO_DESCRIPTOR
            .decode_account(names::DAO_CONFIG, data)?
            .try_into()
    }
}

impl TryFrom<DecodedAccount> for DaoConfig {
    type Error = CodecError;

    fn try_from(decoded: DecodedAccount) -> Result<Self, Self::Error> {
        Ok(Self {
            dao_token_mint: decoded
                .required("dao_token_mint")?
                .as_pubkey()
                .ok_or(CodecError::InvalidData)?,
        })
    }
}

/// A proposal account. `votes` is parallel to `options`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct Proposal {
    pub creator: Address,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub votes: Vec<u64>,
    pub voters: Vec<Address>,
    pub winner_index: Option<u8>,
}

impl Proposal {
    /// The space the program allocates for the account, discriminator included.
    ///
    /// Sized for titles and descriptions up to 256 bytes, 10 options and 100 voters.
    pub const SPACE: usize =
        DISCRIMINATOR_LEN + 32 + 256 + 256 + 8 + 8 + (4 + 8) * 10 + (32 * 100) + 1;

    pub fn try_from_account_data(data: &[u8]) -> Result<Self, CodecError> {
        DAO_DESCRIPTOR
            .decode_account(names::PROPOSAL, data)?
            .try_into()
    }

    pub fn vote_count(&self, option_index: usize) -> Option<u64> {
        self.votes.get(option_index).copied()
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    pub fn winning_option(&self) -> Option<&str> {
        self.winner_index
            .and_then(|i| self.options.get(i as usize))
            .map(String::as_str)
    }
}

impl TryFrom<DecodedAccount> for Proposal {
    type Error = CodecError;

    fn try_from(decoded: DecodedAccount) -> Result<Self, Self::Error> {
        let strings = |name: &str| -> Result<Vec<String>, CodecError> {
            decoded
                .required(name)?
                .as_slice()
                .ok_or(CodecError::InvalidData)?
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or(CodecError::InvalidData))
                .collect()
        };
        let string = |name: &str| -> Result<String, CodecError> {
            decoded
                .required(name)?
                .as_str()
                .map(str::to_string)
                .ok_or(CodecError::InvalidData)
        };
        let timestamp = |name: &str| -> Result<i64, CodecError> {
            decoded
                .required(name)?
                .as_i64()
                .ok_or(CodecError::InvalidData)
        };

        let votes = decoded
            .required("votes")?
            .as_slice()
            .ok_or(CodecError::InvalidData)?
            .iter()
            .map(|v| v.as_u64().ok_or(CodecError::InvalidData))
            .collect::<Result<Vec<_>, _>>()?;
        let voters = decoded
            .required("voters")?
            .as_slice()
            .ok_or(CodecError::InvalidData)?
            .iter()
            .map(|v| v.as_pubkey().ok_or(CodecError::InvalidData))
            .collect::<Result<Vec<_>, _>>()?;
        let winner_index = match decoded
            .required("winner_index")?
            .as_option()
            .ok_or(CodecError::InvalidData)?
        {
            Some(v) => Some(v.as_u8().ok_or(CodecError::InvalidData)?),
            None => None,
        };

        Ok(Self {
            creator: decoded
                .required("creator")?
                .as_pubkey()
                .ok_or(CodecError::InvalidData)?,
            title: string("title")?,
            description: string("description")?,
            options: strings("options")?,
            start_time: timestamp("start_time")?,
            end_time: timestamp("end_time")?,
            votes,
            voters,
            winner_index,
        })
    }
}

/// Writes `discriminator || borsh(state)` into a zeroed buffer of `space` bytes, matching how the
/// program lays out an account it owns.
pub fn to_account_data<T: BorshSerialize>(
    type_name: &str,
    state: &T,
    space: usize,
) -> Result<Vec<u8>, CodecError> {
    let schema = DAO_DESCRIPTOR.account(type_name)?;
    let mut data = schema.discriminator.to_vec();
    state
        .serialize(&mut data)
        .or(Err(CodecError::SchemaMismatch))?;
    if data.len() > space {
        return Err(CodecError::SchemaMismatch);
    }
    data.resize(space, 0);
    Ok(data)
}

const_assert_eq!(DaoConfig::SPACE, 40);
const_assert_eq!(Proposal::SPACE, 3889);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proposal() -> Proposal {
        Proposal {
            creator: Address::new_unique(),
            title: "Upgrade DAO Treasury".to_string(),
            description: "Proposal to increase the DAO treasury allocation to 50%.".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            start_time: 1_700_000_000,
            end_time: 1_700_604_800,
            votes: vec![0, 0],
            voters: vec![],
            winner_index: None,
        }
    }

    #[test]
    fn decodes_what_the_program_writes() {
        let proposal = sample_proposal();
        let data = to_account_data(names::PROPOSAL, &proposal, Proposal::SPACE).unwrap();
        assert_eq!(data.len(), Proposal::SPACE);

        let decoded = Proposal::try_from_account_data(&data).unwrap();
        assert_eq!(decoded, proposal);
        assert_eq!(decoded.votes, vec![0, 0]);
    }

    #[test]
    fn generic_decode_matches_borsh() {
        let mut proposal = sample_proposal();
        proposal.votes = vec![4, 100];
        proposal.voters = vec![Address::new_unique(), Address::new_unique()];
        proposal.winner_index = Some(1);
        let data = to_account_data(names::PROPOSAL, &proposal, Proposal::SPACE).unwrap();

        let via_borsh = Proposal::deserialize(&mut &data[DISCRIMINATOR_LEN..]).unwrap();
        let via_descriptor = Proposal::try_from_account_data(&data).unwrap();
        assert_eq!(via_borsh, via_descriptor);
        assert_eq!(via_descriptor.winning_option(), Some("No"));
    }

    #[test]
    fn wrong_discriminator_decodes_nothing() {
        let config = DaoConfig {
            dao_token_mint: Address::new_unique(),
        };
        let config_data = to_account_data(names::DAO_CONFIG, &config, DaoConfig::SPACE).unwrap();

        assert_eq!(
            DAO_DESCRIPTOR.decode_account(names::PROPOSAL, &config_data),
            Err(CodecError::DiscriminatorMismatch)
        );
        assert_eq!(
            DAO_DESCRIPTOR.decode_account(names::PROPOSAL, &[26, 94, 189]),
            Err(CodecError::DiscriminatorMismatch)
        );
        assert_eq!(
            DaoConfig::try_from_account_data(&config_data),
            Ok(config)
        );
    }

    #[test]
    fn truncated_proposal() {
        let data = to_account_data(names::PROPOSAL, &sample_proposal(), Proposal::SPACE).unwrap();
        // Cut inside the title.
        assert_eq!(
            DAO_DESCRIPTOR.decode_account(names::PROPOSAL, &data[..8 + 32 + 4 + 3]),
            Err(CodecError::TruncatedData)
        );
    }

    #[test]
    fn state_must_fit_the_allocated_space() {
        let mut proposal = sample_proposal();
        let used = DISCRIMINATOR_LEN + borsh::to_vec(&proposal).unwrap().len();
        proposal.title.push_str(&"x".repeat(Proposal::SPACE - used));

        let data = to_account_data(names::PROPOSAL, &proposal, Proposal::SPACE).unwrap();
        assert_eq!(data.len(), Proposal::SPACE);
        assert_eq!(Proposal::try_from_account_data(&data), Ok(proposal.clone()));

        proposal.title.push('x');
        assert_eq!(
            to_account_data(names::PROPOSAL, &proposal, Proposal::SPACE),
            Err(CodecError::SchemaMismatch)
        );
    }

    #[test]
    fn space_is_shared_between_fields() {
        // More voters than the sizing assumes still fit while the strings are short.
        let mut proposal = sample_proposal();
        proposal.voters = vec![Address::new_unique(); 101];
        assert!(to_account_data(names::PROPOSAL, &proposal, Proposal::SPACE).is_ok());

        proposal.voters = vec![Address::new_unique(); 125];
        assert_eq!(
            to_account_data(names::PROPOSAL, &proposal, Proposal::SPACE),
            Err(CodecError::SchemaMismatch)
        );
    }
}

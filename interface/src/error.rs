//! Error types for the DAO program boundary and conversion helpers to represent them as error
//! message strings.

/// Anchor offsets every program-defined error code by this amount.
pub const ANCHOR_ERROR_CODE_OFFSET: u32 = 6000;

/// The custom errors the external program can reject a transaction with.
///
/// Variant order is the on-chain order; the custom error code is
/// [`ANCHOR_ERROR_CODE_OFFSET`] + the variant's index.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[derive(strum_macros::FromRepr, strum_macros::EnumIter, strum_macros::IntoStaticStr)]
#[repr(u32)]
pub enum DaoError {
    InvalidTokenMint,
    UnauthorizedTokenAccount,
    VotingNotStarted,
    VotingEnded,
    InvalidOption,
    VotingNotEnded,
    AlreadyVoted,
}

impl DaoError {
    /// The custom program error code reported by the runtime, e.g. `6006` for
    /// [`DaoError::AlreadyVoted`].
    pub fn code(&self) -> u32 {
        ANCHOR_ERROR_CODE_OFFSET + *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        code.checked_sub(ANCHOR_ERROR_CODE_OFFSET)
            .and_then(DaoError::from_repr)
    }

    /// The variant name as it appears in program logs, e.g. `AlreadyVoted`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The message the program attaches to the error.
    pub fn message(&self) -> &'static str {
        match self {
            DaoError::InvalidTokenMint => "Invalid DAO token mint.",
            DaoError::UnauthorizedTokenAccount => "Unauthorized token account.",
            DaoError::VotingNotStarted => "Voting has not started.",
            DaoError::VotingEnded => "Voting has already ended.",
            DaoError::InvalidOption => "Invalid voting option.",
            DaoError::VotingNotEnded => "Voting period has not ended.",
            DaoError::AlreadyVoted => "You have already voted.",
        }
    }
}

impl core::fmt::Display for DaoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message())
    }
}

impl std::error::Error for DaoError {}

/// Local errors raised while encoding instructions or decoding account data against the
/// program descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CodecError {
    UnknownInstruction,
    UnknownAccountType,
    SchemaMismatch,
    AccountResolution,
    DiscriminatorMismatch,
    TruncatedData,
    InvalidData,
}

impl From<CodecError> for &'static str {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::UnknownInstruction => "Instruction isn't declared in the descriptor",
            CodecError::UnknownAccountType => "Account type isn't declared in the descriptor",
            CodecError::SchemaMismatch => "Arguments don't match the declared schema",
            CodecError::AccountResolution => "A required account address couldn't be resolved",
            CodecError::DiscriminatorMismatch => "Account discriminator doesn't match",
            CodecError::TruncatedData => "Account data ended in the middle of a field",
            CodecError::InvalidData => "Account data holds an invalid value",
        }
    }
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str((*self).into())
    }
}

impl std::error::Error for CodecError {}

/// Structural problems in a [`crate::descriptor::ProgramDescriptor`], detected once at startup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DescriptorError {
    DuplicateName(&'static str),
    DuplicateDiscriminator(&'static str, &'static str),
    UnsignableRole(&'static str, &'static str),
    EmptySeeds(&'static str, &'static str),
}

impl core::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DescriptorError::DuplicateName(name) => write!(f, "`{name}` is declared twice"),
            DescriptorError::DuplicateDiscriminator(a, b) => {
                write!(f, "`{a}` and `{b}` share a discriminator")
            }
            DescriptorError::UnsignableRole(ix, account) => {
                write!(f, "`{ix}.{account}` must sign but isn't supplied by the caller")
            }
            DescriptorError::EmptySeeds(ix, account) => {
                write!(f, "`{ix}.{account}` is derived from an empty seed list")
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn codes_round_trip() {
        for err in DaoError::iter() {
            assert_eq!(DaoError::from_code(err.code()), Some(err));
        }
        assert_eq!(DaoError::AlreadyVoted.code(), 6006);
        assert_eq!(DaoError::from_code(5999), None);
        assert_eq!(DaoError::from_code(6007), None);
    }

    #[test]
    fn names_match_program_logs() {
        assert_eq!(DaoError::InvalidTokenMint.name(), "InvalidTokenMint");
        assert_eq!(DaoError::VotingNotEnded.name(), "VotingNotEnded");
    }
}

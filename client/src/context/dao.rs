//! DAO-level context for building the program's instructions from contextual address data.

use dao_interface::{
    descriptor::{
        self,
        names,
        ProgramDescriptor,
    },
    instructions::AccountMap,
    pack::Value,
};
use solana_address::Address;
use solana_instruction::Instruction;

use crate::{
    forms::ProposalForm,
    pda::find_config_address,
};

/// A struct containing the validated program descriptor and the DAO's config address.
///
/// Implements helper methods for building all program instructions.
#[derive(Clone, Copy, Debug)]
pub struct DaoContext {
    pub descriptor: &'static ProgramDescriptor,
    pub config: Address,
}

impl DaoContext {
    /// Loads the program descriptor, failing if it's internally inconsistent.
    pub fn new() -> anyhow::Result<Self> {
        let descriptor = descriptor::load()?;
        let (config, _bump) = find_config_address();
        Ok(Self { descriptor, config })
    }

    pub fn program_id(&self) -> Address {
        self.descriptor.program_id
    }

    pub fn initialize(
        &self,
        authority: Address,
        dao_token_mint: Address,
    ) -> anyhow::Result<Instruction> {
        Ok(self.descriptor.build_instruction(
            names::INITIALIZE,
            &[dao_token_mint.into()],
            &AccountMap::from([("authority", authority)]),
        )?)
    }

    /// `proposal` is a fresh account the program allocates, so it must sign along with `user`.
    pub fn create_proposal(
        &self,
        proposal: Address,
        user: Address,
        token_account: Address,
        form: &ProposalForm,
    ) -> anyhow::Result<Instruction> {
        let args: [Value; 5] = [
            form.title.as_str().into(),
            form.description.as_str().into(),
            form.options.clone().into(),
            form.start_time.into(),
            form.end_time.into(),
        ];
        Ok(self.descriptor.build_instruction(
            names::CREATE_PROPOSAL,
            &args,
            &AccountMap::from([
                ("proposal", proposal),
                ("user", user),
                ("token_account", token_account),
            ]),
        )?)
    }

    pub fn vote(
        &self,
        proposal: Address,
        user: Address,
        token_account: Address,
        option_index: u8,
    ) -> anyhow::Result<Instruction> {
        Ok(self.descriptor.build_instruction(
            names::VOTE,
            &[option_index.into()],
            &AccountMap::from([
                ("proposal", proposal),
                ("user", user),
                ("token_account", token_account),
            ]),
        )?)
    }

    pub fn tally_votes(&self, proposal: Address) -> anyhow::Result<Instruction> {
        Ok(self.descriptor.build_instruction(
            names::TALLY_VOTES,
            &[],
            &AccountMap::from([("proposal", proposal)]),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use solana_instruction::AccountMeta;

    use super::*;

    #[test]
    fn initialize_writes_the_config_pda() {
        let ctx = DaoContext::new().unwrap();
        let authority = Address::new_unique();
        let mint = Address::new_unique();
        let ix = ctx.initialize(authority, mint).unwrap();

        assert_eq!(ix.program_id, dao_interface::program::ID);
        assert_eq!(ix.accounts[0], AccountMeta::new(ctx.config, false));
        assert_eq!(ix.accounts[1], AccountMeta::new(authority, true));
        assert_eq!(ix.data[8..], mint.to_bytes());
    }

    #[test]
    fn create_proposal_encodes_form() {
        let ctx = DaoContext::new().unwrap();
        let form = ProposalForm::new("T", "D", vec!["Yes".into(), "No".into()], 10, 20).unwrap();
        let proposal = Address::new_unique();
        let ix = ctx
            .create_proposal(proposal, Address::new_unique(), Address::new_unique(), &form)
            .unwrap();

        #[rustfmt::skip]
        let expected_args: &[u8] = &[
            1, 0, 0, 0, b'T',
            1, 0, 0, 0, b'D',
            2, 0, 0, 0, 3, 0, 0, 0, b'Y', b'e', b's', 2, 0, 0, 0, b'N', b'o',
            10, 0, 0, 0, 0, 0, 0, 0,
            20, 0, 0, 0, 0, 0, 0, 0,
        ];
        assert_eq!(&ix.data[8..], expected_args);
        assert_eq!(ix.accounts[0], AccountMeta::new(proposal, true));
    }

    #[test]
    fn tally_only_touches_the_proposal() {
        let ctx = DaoContext::new().unwrap();
        let proposal = Address::new_unique();
        let ix = ctx.tally_votes(proposal).unwrap();
        assert_eq!(ix.accounts, vec![AccountMeta::new(proposal, false)]);
        assert_eq!(ix.data, [144, 82, 0, 72, 160, 132, 35, 121]);
    }
}

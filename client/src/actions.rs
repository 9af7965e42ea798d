//! The transaction orchestrator: drives one user action from input validation through
//! confirmation, exposing each stage as it happens.

use colored::Colorize;
use dao_interface::{
    error::DaoError,
    TOKEN_PROGRAM_ID,
};
use solana_address::Address;
use solana_instruction::Instruction;
use solana_sdk::signature::{
    Keypair,
    Signature,
    Signer,
};
use spl_associated_token_account_interface::instruction::create_associated_token_account_idempotent;

use crate::{
    connection::DaoConnection,
    context::dao::DaoContext,
    forms::ProposalForm,
    logs::log_confirmed,
    pda::find_voter_token_account,
    print_kv,
    rejection::Rejection,
    transactions::{
        confirm_transaction,
        sign_transaction,
        ConfirmationTimeout,
    },
    views::fetch_config,
    LogColor,
};

#[derive(Clone, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum ActionStage {
    Idle,
    ValidatingInputs,
    ResolvingAccounts,
    BuildingInstructions,
    Submitting,
    Confirming,
    Succeeded(Signature),
    Failed(ActionFailure),
}

impl ActionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStage::Succeeded(_) | ActionStage::Failed(_))
    }
}

/// Why an action failed, in a form a voter can read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionFailure {
    pub reason: String,
    /// Set when the program rejected the transaction with one of its own errors.
    pub program_error: Option<DaoError>,
    /// The signature of a transaction that was sent but never confirmed.
    pub unconfirmed: Option<Signature>,
}

impl ActionFailure {
    fn local(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            program_error: None,
            unconfirmed: None,
        }
    }
}

impl From<anyhow::Error> for ActionFailure {
    fn from(error: anyhow::Error) -> Self {
        if let Some(rejection) = error.downcast_ref::<Rejection>() {
            return Self {
                reason: rejection.reason().to_string(),
                program_error: rejection.program_error,
                unconfirmed: None,
            };
        }
        if let Some(timeout) = error.downcast_ref::<ConfirmationTimeout>() {
            return Self {
                reason: timeout.to_string(),
                program_error: None,
                unconfirmed: Some(timeout.signature),
            };
        }
        Self::local(format!("{error:#}"))
    }
}

impl core::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Runs actions against one connection, one at a time.
///
/// Every stage an action passes through is recorded; [`ActionRunner::history`] returns the stages
/// of the most recent action. Rejected submissions are never retried.
pub struct ActionRunner<'a, C: DaoConnection> {
    conn: &'a C,
    dao: DaoContext,
    history: Vec<ActionStage>,
}

impl<'a, C: DaoConnection> ActionRunner<'a, C> {
    pub fn new(conn: &'a C) -> anyhow::Result<Self> {
        Ok(Self {
            conn,
            dao: DaoContext::new()?,
            history: vec![ActionStage::Idle],
        })
    }

    pub fn stage(&self) -> &ActionStage {
        self.history.last().unwrap_or(&ActionStage::Idle)
    }

    pub fn history(&self) -> &[ActionStage] {
        &self.history
    }

    fn advance(&mut self, stage: ActionStage) {
        if self.conn.config().debug_logs() {
            match &stage {
                ActionStage::Failed(failure) => print_kv!("Failed", failure, LogColor::Error),
                ActionStage::Succeeded(_) => {}
                stage => print_kv!("Stage", stage, LogColor::Debug),
            }
        }
        self.history.push(stage);
    }

    fn begin(&mut self) {
        self.history = vec![ActionStage::Idle, ActionStage::ValidatingInputs];
    }

    fn finish(&mut self, action: &str, result: Result<Signature, ActionFailure>) -> ActionStage {
        let stage = match result {
            Ok(signature) => {
                if self.conn.config().debug_logs() {
                    log_confirmed(action, &signature);
                }
                ActionStage::Succeeded(signature)
            }
            Err(failure) => ActionStage::Failed(failure),
        };
        self.advance(stage.clone());
        stage
    }

    /// Resolves `owner`'s token account for the DAO mint, along with an instruction creating it
    /// if it doesn't exist yet.
    async fn resolve_token_account(
        &self,
        payer: &Address,
        owner: &Address,
    ) -> Result<(Address, Option<Instruction>), ActionFailure> {
        let config = fetch_config(self.conn)
            .await?
            .ok_or_else(|| ActionFailure::local("The DAO hasn't been initialized"))?;
        let token_account = find_voter_token_account(owner, &config.dao_token_mint);
        let create = match self.conn.account_exists(&token_account).await? {
            true => None,
            false => Some(create_associated_token_account_idempotent(
                payer,
                owner,
                &config.dao_token_mint,
                &TOKEN_PROGRAM_ID,
            )),
        };
        Ok((token_account, create))
    }

    async fn send(
        &mut self,
        payer: &Keypair,
        signers: &[&Keypair],
        instructions: &[Instruction],
    ) -> Result<Signature, ActionFailure> {
        self.advance(ActionStage::Submitting);
        let tx = sign_transaction(self.conn, payer, signers, instructions).await?;
        let signature = self.conn.send_transaction(&tx).await?;
        self.advance(ActionStage::Confirming);
        confirm_transaction(self.conn, &tx, &signature).await?;
        Ok(signature)
    }

    pub async fn initialize(&mut self, authority: &Keypair, dao_token_mint: Address) -> ActionStage {
        self.begin();
        let result = self.try_initialize(authority, dao_token_mint).await;
        self.finish("Initialized DAO", result)
    }

    async fn try_initialize(
        &mut self,
        authority: &Keypair,
        dao_token_mint: Address,
    ) -> Result<Signature, ActionFailure> {
        self.advance(ActionStage::ResolvingAccounts);
        if self.conn.account_exists(&self.dao.config).await? {
            return Err(ActionFailure::local("The DAO is already initialized"));
        }
        self.advance(ActionStage::BuildingInstructions);
        let ix = self.dao.initialize(authority.pubkey(), dao_token_mint)?;
        self.send(authority, &[], &[ix]).await
    }

    /// Creates a proposal at `proposal`'s address, which must be a fresh keypair.
    pub async fn create_proposal(
        &mut self,
        user: &Keypair,
        proposal: &Keypair,
        form: &ProposalForm,
    ) -> ActionStage {
        self.begin();
        let result = self.try_create_proposal(user, proposal, form).await;
        self.finish("Created proposal", result)
    }

    async fn try_create_proposal(
        &mut self,
        user: &Keypair,
        proposal: &Keypair,
        form: &ProposalForm,
    ) -> Result<Signature, ActionFailure> {
        // Re-run validation; a form can be built field by field.
        ProposalForm::new(
            &form.title,
            &form.description,
            form.options.clone(),
            form.start_time,
            form.end_time,
        )
        .map_err(|err| ActionFailure::local(<&str>::from(err)))?;

        self.advance(ActionStage::ResolvingAccounts);
        let (token_account, create_ata) = self
            .resolve_token_account(&user.pubkey(), &user.pubkey())
            .await?;

        self.advance(ActionStage::BuildingInstructions);
        let create_proposal =
            self.dao
                .create_proposal(proposal.pubkey(), user.pubkey(), token_account, form)?;
        let instructions: Vec<Instruction> =
            create_ata.into_iter().chain([create_proposal]).collect();

        self.send(user, &[proposal], &instructions).await
    }

    pub async fn vote(
        &mut self,
        user: &Keypair,
        proposal: &Address,
        option_index: usize,
    ) -> ActionStage {
        self.begin();
        let result = self.try_vote(user, proposal, option_index).await;
        self.finish("Voted", result)
    }

    async fn try_vote(
        &mut self,
        user: &Keypair,
        proposal: &Address,
        option_index: usize,
    ) -> Result<Signature, ActionFailure> {
        let option_index = u8::try_from(option_index)
            .map_err(|_| ActionFailure::local(DaoError::InvalidOption.message()))?;

        self.advance(ActionStage::ResolvingAccounts);
        let (token_account, create_ata) = self
            .resolve_token_account(&user.pubkey(), &user.pubkey())
            .await?;

        self.advance(ActionStage::BuildingInstructions);
        let vote = self
            .dao
            .vote(*proposal, user.pubkey(), token_account, option_index)?;
        let instructions: Vec<Instruction> = create_ata.into_iter().chain([vote]).collect();

        self.send(user, &[], &instructions).await
    }

    /// Tallies `proposal`, paid for by `payer`. Anyone can tally once voting has ended.
    pub async fn tally(&mut self, payer: &Keypair, proposal: &Address) -> ActionStage {
        self.begin();
        let result = self.try_tally(payer, proposal).await;
        self.finish("Tallied votes", result)
    }

    async fn try_tally(
        &mut self,
        payer: &Keypair,
        proposal: &Address,
    ) -> Result<Signature, ActionFailure> {
        self.advance(ActionStage::ResolvingAccounts);
        self.advance(ActionStage::BuildingInstructions);
        let ix = self.dao.tally_votes(*proposal)?;
        self.send(payer, &[], &[ix]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_from_rejections_keep_the_program_error() {
        let rejection = Rejection::new(
            "Transaction simulation failed: Error processing Instruction 0: custom program error: \
             0x1776",
            vec![],
        );
        let failure = ActionFailure::from(anyhow::Error::from(rejection));
        assert_eq!(failure.program_error, Some(DaoError::AlreadyVoted));
        assert_eq!(failure.reason, "You have already voted.");
    }

    #[test]
    fn failures_from_timeouts_keep_the_signature() {
        let timeout = ConfirmationTimeout {
            signature: Signature::default(),
            attempts: 2,
        };
        let failure = ActionFailure::from(anyhow::Error::from(timeout));
        assert_eq!(failure.unconfirmed, Some(Signature::default()));
        assert_eq!(failure.program_error, None);
    }

    #[test]
    fn local_failures_keep_context() {
        let error = anyhow::anyhow!("connection refused").context("Couldn't retrieve account data");
        let failure = ActionFailure::from(error);
        assert_eq!(
            failure.reason,
            "Couldn't retrieve account data: connection refused"
        );
    }
}

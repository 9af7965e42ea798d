//! An in-memory stand-in for a cluster running the DAO program, for tests and local dry runs.
//!
//! [`MockDao`] implements [`DaoConnection`] and applies the program's documented rules to every
//! transaction it receives: instructions are decoded with the same descriptor the client encodes
//! with, a transaction's instructions either all apply or none do, and failures are reported with
//! the same message and log shapes a real cluster's preflight check produces.

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};

use dao_interface::{
    descriptor::{
        names,
        AccountSource,
        InstructionSchema,
        DAO_DESCRIPTOR,
    },
    error::DaoError,
    pack::{
        unpack_fields,
        Value,
    },
    state::{
        to_account_data,
        DaoConfig,
        Proposal,
    },
    Discriminator,
    DISCRIMINATOR_LEN,
};
use solana_account::Account;
use solana_address::Address;
use solana_sdk::{
    hash::Hash,
    program_pack::Pack,
    rent::Rent,
    signature::Signature,
    transaction::Transaction,
};
use spl_associated_token_account_interface::address::get_associated_token_address;
use spl_token_interface::state::{
    Account as TokenAccount,
    AccountState,
    Mint,
};

use crate::{
    connection::DaoConnection,
    rejection::Rejection,
    transactions::SendTransactionConfig,
};

/// The default mock clock: 2023-11-14T22:13:20Z.
pub const MOCK_DEFAULT_CLOCK: i64 = 1_700_000_000;

/// Anchor framework error codes the mock can raise.
mod anchor_codes {
    pub const INSTRUCTION_FALLBACK_NOT_FOUND: u32 = 101;
    pub const INSTRUCTION_DID_NOT_DESERIALIZE: u32 = 102;
    pub const CONSTRAINT_SEEDS: u32 = 2006;
    pub const ACCOUNT_DISCRIMINATOR_MISMATCH: u32 = 3002;
    pub const ACCOUNT_DID_NOT_DESERIALIZE: u32 = 3003;
    pub const ACCOUNT_DID_NOT_SERIALIZE: u32 = 3004;
    pub const NOT_ENOUGH_ACCOUNT_KEYS: u32 = 3005;
    pub const INVALID_PROGRAM_ID: u32 = 3008;
    pub const ACCOUNT_NOT_SIGNER: u32 = 3010;
    pub const ACCOUNT_NOT_INITIALIZED: u32 = 3012;
}

struct MockState {
    accounts: HashMap<Address, Account>,
    clock: i64,
    blockhash_nonce: u64,
    landed: HashSet<Signature>,
    sends: usize,
    withhold_confirmations: bool,
}

pub struct MockDao {
    config: SendTransactionConfig,
    state: Mutex<MockState>,
}

impl Default for MockDao {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDao {
    pub fn new() -> Self {
        Self::with_config(SendTransactionConfig {
            compute_budget: None,
            debug_logs: Some(false),
            confirm_poll_interval: Duration::from_millis(5),
            confirm_timeout: Duration::from_millis(20),
            resend_attempts: 1,
        })
    }

    pub fn with_config(config: SendTransactionConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MockState {
                accounts: HashMap::new(),
                clock: MOCK_DEFAULT_CLOCK,
                blockhash_nonce: 0,
                landed: HashSet::new(),
                sends: 0,
                withhold_confirmations: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> i64 {
        self.state().clock
    }

    pub fn set_clock(&self, unix_timestamp: i64) {
        self.state().clock = unix_timestamp;
    }

    pub fn advance_clock(&self, seconds: i64) {
        self.state().clock += seconds;
    }

    /// While set, transactions still land but are never reported as confirmed.
    pub fn withhold_confirmations(&self, withhold: bool) {
        self.state().withhold_confirmations = withhold;
    }

    /// How many times a transaction was sent, re-sends included.
    pub fn send_count(&self) -> usize {
        self.state().sends
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.state().accounts.get(address).cloned()
    }

    pub fn set_account(&self, address: Address, account: Account) {
        self.state().accounts.insert(address, account);
    }

    pub fn proposal(&self, address: &Address) -> Option<Proposal> {
        self.account(address)
            .and_then(|account| Proposal::try_from_account_data(&account.data).ok())
    }

    /// Creates an initialized token mint with zero decimals and returns its address.
    pub fn create_mint(&self) -> Address {
        let address = Address::new_unique();
        let mint = Mint {
            decimals: 0,
            is_initialized: true,
            ..Default::default()
        };
        let mut data = vec![0; Mint::LEN];
        Mint::pack(mint, &mut data).unwrap_or_default();
        self.set_account(address, token_program_account(data));
        address
    }

    /// Sets `owner`'s balance of `mint` in their associated token account, creating it if needed.
    pub fn set_token_balance(&self, owner: &Address, mint: &Address, amount: u64) -> Address {
        let address = get_associated_token_address(owner, mint);
        self.set_account(address, token_account(owner, mint, amount));
        address
    }

    fn process(state: &mut MockState, tx: &Transaction) -> Result<(), Rejection> {
        if tx.signatures.iter().any(|sig| *sig == Signature::default()) {
            return Err(Rejection::new(
                "Transaction did not pass signature verification",
                vec![],
            ));
        }

        let message = &tx.message;
        let num_signers = message.header.num_required_signatures as usize;
        let mut accounts = state.accounts.clone();

        for (index, ix) in message.instructions.iter().enumerate() {
            let program_id = message.account_keys[ix.program_id_index as usize];
            let metas: Vec<(Address, bool)> = ix
                .accounts
                .iter()
                .map(|&key| (message.account_keys[key as usize], (key as usize) < num_signers))
                .collect();
            let mut ctx = InstructionContext {
                index,
                accounts: &mut accounts,
                clock: state.clock,
            };

            if program_id == DAO_DESCRIPTOR.program_id {
                ctx.process_dao(&metas, &ix.data)?;
            } else if program_id == spl_associated_token_account_interface::program::ID {
                ctx.process_create_ata(&metas, &ix.data)?;
            } else if program_id != solana_compute_budget_interface::ID {
                return Err(Rejection::new(
                    format!(
                        "Transaction simulation failed: Error processing Instruction {index}: \
                         Unsupported program id"
                    ),
                    vec![format!("Program {program_id} is not deployed")],
                ));
            }
        }

        state.accounts = accounts;
        Ok(())
    }
}

fn rent_exempt(data: Vec<u8>, owner: Address) -> Account {
    Account {
        lamports: Rent::default().minimum_balance(data.len()),
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

fn token_program_account(data: Vec<u8>) -> Account {
    rent_exempt(data, spl_token_interface::ID)
}

fn token_account(owner: &Address, mint: &Address, amount: u64) -> Account {
    let state = TokenAccount {
        mint: *mint,
        owner: *owner,
        amount,
        state: AccountState::Initialized,
        ..Default::default()
    };
    let mut data = vec![0; TokenAccount::LEN];
    TokenAccount::pack(state, &mut data).unwrap_or_default();
    token_program_account(data)
}

struct InstructionContext<'a> {
    index: usize,
    accounts: &'a mut HashMap<Address, Account>,
    clock: i64,
}

impl InstructionContext<'_> {
    fn rejection(&self, code: u32, name: &str, message: &str) -> Rejection {
        Rejection::new(
            format!(
                "Transaction simulation failed: Error processing Instruction {}: custom program \
                 error: {code:#x}",
                self.index
            ),
            vec![
                format!("Program {} invoke [1]", DAO_DESCRIPTOR.program_id),
                format!(
                    "Program log: AnchorError occurred. Error Code: {name}. Error Number: {code}. \
                     Error Message: {message}"
                ),
                format!(
                    "Program {} failed: custom program error: {code:#x}",
                    DAO_DESCRIPTOR.program_id
                ),
            ],
        )
    }

    fn program_error(&self, error: DaoError) -> Rejection {
        self.rejection(error.code(), error.name(), error.message())
    }

    fn already_in_use(&self, address: &Address) -> Rejection {
        Rejection::new(
            format!(
                "Transaction simulation failed: Error processing Instruction {}: custom program \
                 error: 0x0",
                self.index
            ),
            vec![format!("Allocate: account {address} already in use")],
        )
    }

    fn load<T>(
        &self,
        address: &Address,
        decode: fn(&[u8]) -> Result<T, dao_interface::error::CodecError>,
    ) -> Result<T, Rejection> {
        let account = self
            .accounts
            .get(address)
            .filter(|account| account.owner == DAO_DESCRIPTOR.program_id)
            .ok_or_else(|| {
                self.rejection(
                    anchor_codes::ACCOUNT_NOT_INITIALIZED,
                    "AccountNotInitialized",
                    "The program expected this account to be already initialized",
                )
            })?;
        decode(&account.data).map_err(|_| {
            self.rejection(
                anchor_codes::ACCOUNT_DISCRIMINATOR_MISMATCH,
                "AccountDiscriminatorMismatch",
                "8 byte discriminator did not match what was expected",
            )
        })
    }

    fn store<T: borsh::BorshSerialize>(
        &mut self,
        address: Address,
        type_name: &str,
        state: &T,
        space: usize,
    ) -> Result<(), Rejection> {
        let data = to_account_data(type_name, state, space).map_err(|_| {
            self.rejection(
                anchor_codes::ACCOUNT_DID_NOT_SERIALIZE,
                "AccountDidNotSerialize",
                "Failed to serialize the account",
            )
        })?;
        let lamports = self
            .accounts
            .get(&address)
            .map_or(Rent::default().minimum_balance(space), |account| account.lamports);
        let mut account = rent_exempt(data, DAO_DESCRIPTOR.program_id);
        account.lamports = lamports;
        self.accounts.insert(address, account);
        Ok(())
    }

    fn token_account(&self, address: &Address) -> Result<TokenAccount, Rejection> {
        self.accounts
            .get(address)
            .filter(|account| account.owner == spl_token_interface::ID)
            .and_then(|account| TokenAccount::unpack(&account.data).ok())
            .ok_or_else(|| {
                self.rejection(
                    anchor_codes::ACCOUNT_DID_NOT_DESERIALIZE,
                    "AccountDidNotDeserialize",
                    "Failed to deserialize the account",
                )
            })
    }

    /// Matches each of the schema's account roles to the instruction's accounts, checking signers
    /// and the derived and constant addresses.
    fn bind_accounts(
        &self,
        schema: &InstructionSchema,
        metas: &[(Address, bool)],
    ) -> Result<HashMap<&'static str, Address>, Rejection> {
        if metas.len() < schema.accounts.len() {
            return Err(self.rejection(
                anchor_codes::NOT_ENOUGH_ACCOUNT_KEYS,
                "AccountNotEnoughKeys",
                "Not enough account keys given to the instruction",
            ));
        }

        let mut bound = HashMap::new();
        for (role, &(address, is_signer)) in schema.accounts.iter().zip(metas) {
            if role.signer && !is_signer {
                return Err(self.rejection(
                    anchor_codes::ACCOUNT_NOT_SIGNER,
                    "AccountNotSigner",
                    "The given account did not sign",
                ));
            }
            match role.source {
                AccountSource::Derived(seeds)
                    if address != dao_interface::seeds::derive(seeds, &DAO_DESCRIPTOR.program_id).0 =>
                {
                    return Err(self.rejection(
                        anchor_codes::CONSTRAINT_SEEDS,
                        "ConstraintSeeds",
                        "A seeds constraint was violated",
                    ));
                }
                AccountSource::Constant(expected) if address != expected => {
                    return Err(self.rejection(
                        anchor_codes::INVALID_PROGRAM_ID,
                        "InvalidProgramId",
                        "Program ID was not as expected",
                    ));
                }
                _ => {}
            }
            bound.insert(role.name, address);
        }
        Ok(bound)
    }

    fn process_dao(&mut self, metas: &[(Address, bool)], data: &[u8]) -> Result<(), Rejection> {
        let schema = DAO_DESCRIPTOR
            .instructions
            .iter()
            .find(|schema| data.starts_with(&schema.discriminator))
            .ok_or_else(|| {
                self.rejection(
                    anchor_codes::INSTRUCTION_FALLBACK_NOT_FOUND,
                    "InstructionFallbackNotFound",
                    "Fallback functions are not supported",
                )
            })?;
        let args = unpack_fields(schema.args, &data[DISCRIMINATOR_LEN..]).map_err(|_| {
            self.rejection(
                anchor_codes::INSTRUCTION_DID_NOT_DESERIALIZE,
                "InstructionDidNotDeserialize",
                "The program could not deserialize the given instruction",
            )
        })?;
        let args: HashMap<&str, Value> = args.into_iter().collect();
        let accounts = self.bind_accounts(schema, metas)?;
        // Roles and args were checked against the schema above.
        let account = |name: &str| accounts[name];

        match schema.name {
            names::INITIALIZE => {
                let config = account("config");
                if self.accounts.contains_key(&config) {
                    return Err(self.already_in_use(&config));
                }
                let dao_token_mint = args["dao_token_mint"].as_pubkey().unwrap_or_default();
                self.store(
                    config,
                    names::DAO_CONFIG,
                    &DaoConfig { dao_token_mint },
                    DaoConfig::SPACE,
                )
            }
            names::CREATE_PROPOSAL => {
                let (proposal, user) = (account("proposal"), account("user"));
                if self.accounts.contains_key(&proposal) {
                    return Err(self.already_in_use(&proposal));
                }
                let config = self.load(&account("config"), DaoConfig::try_from_account_data)?;
                let token_account = self.token_account(&account("token_account"))?;
                if token_account.owner != user {
                    return Err(self.program_error(DaoError::UnauthorizedTokenAccount));
                }
                if token_account.mint != config.dao_token_mint {
                    return Err(self.program_error(DaoError::InvalidTokenMint));
                }

                let options: Vec<String> = args["options"]
                    .as_slice()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|option| option.as_str().map(str::to_string))
                    .collect();
                let state = Proposal {
                    creator: user,
                    title: args["title"].as_str().unwrap_or_default().to_string(),
                    description: args["description"].as_str().unwrap_or_default().to_string(),
                    votes: vec![0; options.len()],
                    options,
                    start_time: args["start_time"].as_i64().unwrap_or_default(),
                    end_time: args["end_time"].as_i64().unwrap_or_default(),
                    voters: vec![],
                    winner_index: None,
                };
                self.store(proposal, names::PROPOSAL, &state, Proposal::SPACE)
            }
            names::VOTE => {
                let (address, user) = (account("proposal"), account("user"));
                let mut proposal = self.load(&address, Proposal::try_from_account_data)?;
                let config = self.load(&account("config"), DaoConfig::try_from_account_data)?;
                let option_index = args["option_index"].as_u8().unwrap_or_default() as usize;

                if self.clock < proposal.start_time {
                    return Err(self.program_error(DaoError::VotingNotStarted));
                }
                if self.clock > proposal.end_time {
                    return Err(self.program_error(DaoError::VotingEnded));
                }
                if option_index >= proposal.options.len() {
                    return Err(self.program_error(DaoError::InvalidOption));
                }
                if proposal.voters.contains(&user) {
                    return Err(self.program_error(DaoError::AlreadyVoted));
                }
                let token_account = self.token_account(&account("token_account"))?;
                if token_account.mint != config.dao_token_mint {
                    return Err(self.program_error(DaoError::InvalidTokenMint));
                }

                proposal.votes[option_index] =
                    proposal.votes[option_index].saturating_add(token_account.amount);
                proposal.voters.push(user);
                self.store(address, names::PROPOSAL, &proposal, Proposal::SPACE)
            }
            names::TALLY_VOTES => {
                let address = account("proposal");
                let mut proposal = self.load(&address, Proposal::try_from_account_data)?;
                if self.clock <= proposal.end_time {
                    return Err(self.program_error(DaoError::VotingNotEnded));
                }
                proposal.winner_index = strict_max_index(&proposal.votes);
                self.store(address, names::PROPOSAL, &proposal, Proposal::SPACE)
            }
            _ => Err(self.rejection(
                anchor_codes::INSTRUCTION_FALLBACK_NOT_FOUND,
                "InstructionFallbackNotFound",
                "Fallback functions are not supported",
            )),
        }
    }

    /// Handles the associated token account program's `Create` and `CreateIdempotent`.
    fn process_create_ata(
        &mut self,
        metas: &[(Address, bool)],
        data: &[u8],
    ) -> Result<(), Rejection> {
        let idempotent = data.first() == Some(&1);
        let fail = |reason: &str| {
            Rejection::new(
                format!(
                    "Transaction simulation failed: Error processing Instruction {}: {reason}",
                    self.index
                ),
                vec![],
            )
        };
        let [_payer, ata, wallet, mint, ..] = metas else {
            return Err(fail("not enough account keys"));
        };
        let (ata, wallet, mint) = (ata.0, wallet.0, mint.0);

        if ata != get_associated_token_address(&wallet, &mint) {
            return Err(fail("Provided seeds do not result in a valid address"));
        }
        if !self
            .accounts
            .get(&mint)
            .is_some_and(|account| account.owner == spl_token_interface::ID)
        {
            return Err(fail("invalid account data for instruction"));
        }
        if self.accounts.contains_key(&ata) {
            return match idempotent {
                true => Ok(()),
                false => Err(self.already_in_use(&ata)),
            };
        }
        self.accounts.insert(ata, token_account(&wallet, &mint, 0));
        Ok(())
    }
}

/// The first index holding the strictly largest count. `None` when every count is zero.
fn strict_max_index(votes: &[u64]) -> Option<u8> {
    let mut max_votes = 0;
    let mut winner = None;
    for (i, &count) in votes.iter().enumerate() {
        if count > max_votes {
            max_votes = count;
            winner = Some(i as u8);
        }
    }
    winner
}

impl DaoConnection for MockDao {
    fn config(&self) -> &SendTransactionConfig {
        &self.config
    }

    async fn fetch_account(&self, address: &Address) -> anyhow::Result<Option<Account>> {
        Ok(self.account(address))
    }

    async fn fetch_program_accounts(
        &self,
        program_id: &Address,
        discriminator: &Discriminator,
    ) -> anyhow::Result<Vec<(Address, Account)>> {
        let mut matching: Vec<(Address, Account)> = self
            .state()
            .accounts
            .iter()
            .filter(|(_, account)| {
                &account.owner == program_id && account.data.starts_with(discriminator)
            })
            .map(|(address, account)| (*address, account.clone()))
            .collect();
        matching.sort_by_key(|(address, _)| *address);
        Ok(matching)
    }

    async fn unix_timestamp(&self) -> anyhow::Result<i64> {
        Ok(self.now())
    }

    async fn latest_blockhash(&self) -> anyhow::Result<Hash> {
        let mut state = self.state();
        state.blockhash_nonce += 1;
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&state.blockhash_nonce.to_le_bytes());
        Ok(Hash::new_from_array(bytes))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> anyhow::Result<Signature> {
        let mut state = self.state();
        state.sends += 1;
        let signature = transaction.signatures.first().copied().unwrap_or_default();
        // A re-sent transaction carries the same signature and is never applied twice.
        if state.landed.contains(&signature) {
            return Ok(signature);
        }
        Self::process(&mut state, transaction)?;
        state.landed.insert(signature);
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> anyhow::Result<Option<Result<(), Rejection>>> {
        let state = self.state();
        if state.withhold_confirmations {
            return Ok(None);
        }
        Ok(state.landed.contains(signature).then_some(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_max_keeps_the_first_highest_count() {
        assert_eq!(strict_max_index(&[0, 3, 1]), Some(1));
        assert_eq!(strict_max_index(&[2, 2, 1]), Some(0));
        assert_eq!(strict_max_index(&[0, 0]), None);
        assert_eq!(strict_max_index(&[]), None);
    }

    #[test]
    fn token_balances_are_real_token_accounts() {
        let mock = MockDao::new();
        let owner = Address::new_unique();
        let mint = mock.create_mint();
        let ata = mock.set_token_balance(&owner, &mint, 42);

        let account = mock.account(&ata).unwrap();
        assert_eq!(account.owner, spl_token_interface::ID);
        let state = TokenAccount::unpack(&account.data).unwrap();
        assert_eq!((state.owner, state.mint, state.amount), (owner, mint, 42));
    }

    #[test]
    fn clock_is_controllable() {
        let mock = MockDao::new();
        assert_eq!(mock.now(), MOCK_DEFAULT_CLOCK);
        mock.advance_clock(60);
        assert_eq!(mock.now(), MOCK_DEFAULT_CLOCK + 60);
        mock.set_clock(5);
        assert_eq!(mock.now(), 5);
    }
}

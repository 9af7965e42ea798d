//! Token-level context for the DAO's voting token: creating the mint, deriving and creating voter
//! token accounts, and minting or transferring voting power.

use anyhow::bail;
use solana_address::Address;
use solana_instruction::Instruction;
use solana_sdk::{
    program_pack::Pack,
    signature::Keypair,
    signer::Signer,
};
use spl_associated_token_account_interface::instruction::create_associated_token_account_idempotent;
use spl_token_interface::{
    instruction::{
        initialize_mint2,
        mint_to_checked,
        transfer_checked,
    },
    state::{
        Account,
        Mint,
    },
};

use crate::{
    connection::DaoConnection,
    pda::find_voter_token_account,
    transactions::CustomRpcClient,
};

pub struct TokenContext {
    /// If the mint authority is provided, [`TokenContext`] can mint voting tokens directly to
    /// voters.
    mint_authority: Option<Keypair>,
    pub mint_address: Address,
    pub token_program: Address,
    pub mint_decimals: u8,
}

impl TokenContext {
    /// Creates a new [`TokenContext`] from an existing mint. Checks that the mint exists on-chain
    /// and is owned by the token program.
    pub async fn new_from_existing(
        rpc: &CustomRpcClient,
        mint_address: Address,
        mint_authority: Option<Keypair>,
    ) -> anyhow::Result<Self> {
        let Some(mint_account) = rpc.fetch_account(&mint_address).await? else {
            bail!("Mint {mint_address} doesn't exist");
        };
        if mint_account.owner != spl_token_interface::ID {
            bail!("Mint {mint_address} isn't owned by the token program");
        }
        let mint = Mint::unpack(&mint_account.data)?;

        let passed = mint_authority.as_ref().map(|kp| kp.pubkey());
        let on_chain: Option<Address> = mint.mint_authority.into();
        if passed.is_some() && passed != on_chain {
            bail!("Mint authority passed in {passed:#?} doesn't match authority on-chain {on_chain:#?}");
        }

        Ok(Self {
            mint_authority,
            mint_address,
            token_program: mint_account.owner,
            mint_decimals: mint.decimals,
        })
    }

    /// Creates a new mint with `mint_authority` as both payer and authority.
    pub async fn create_new_from_mint(
        rpc: &CustomRpcClient,
        mint_authority: Keypair,
        mint: Keypair,
        decimals: u8,
    ) -> anyhow::Result<Self> {
        let token_program = spl_token_interface::ID;
        let mint_rent = rpc
            .client
            .get_minimum_balance_for_rent_exemption(Mint::LEN)
            .await?;
        let create_mint_account = solana_system_interface::instruction::create_account(
            &mint_authority.pubkey(),
            &mint.pubkey(),
            mint_rent,
            Mint::LEN as u64,
            &token_program,
        );
        let initialize_mint = initialize_mint2(
            &token_program,
            &mint.pubkey(),
            &mint_authority.pubkey(),
            None,
            decimals,
        )?;

        rpc.send_and_confirm_txn(
            &mint_authority,
            &[&mint],
            &[create_mint_account, initialize_mint],
        )
        .await?;

        Ok(Self {
            mint_authority: Some(mint_authority),
            mint_address: mint.pubkey(),
            token_program,
            mint_decimals: decimals,
        })
    }

    pub fn mint_authority(&self) -> anyhow::Result<&Keypair> {
        match &self.mint_authority {
            Some(authority) => Ok(authority),
            None => bail!("Mint authority wasn't passed to the token context"),
        }
    }

    pub fn get_ata_for(&self, owner: &Address) -> Address {
        find_voter_token_account(owner, &self.mint_address)
    }

    /// Creates `owner`'s token account, paid for by `payer`. A no-op if it already exists.
    pub fn create_ata_instruction(&self, payer: &Address, owner: &Address) -> Instruction {
        create_associated_token_account_idempotent(
            payer,
            owner,
            &self.mint_address,
            &self.token_program,
        )
    }

    /// Mints `amount` tokens into `owner`'s token account. Requires the mint authority.
    pub fn mint_to_instruction(&self, owner: &Address, amount: u64) -> anyhow::Result<Instruction> {
        let mint_authority = self.mint_authority()?;
        Ok(mint_to_checked(
            &self.token_program,
            &self.mint_address,
            &self.get_ata_for(owner),
            &mint_authority.pubkey(),
            &[],
            amount,
            self.mint_decimals,
        )?)
    }

    /// Moves `amount` tokens from `from`'s token account to `to`'s token account.
    pub fn transfer_instruction(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> anyhow::Result<Instruction> {
        Ok(transfer_checked(
            &self.token_program,
            &self.get_ata_for(from),
            &self.mint_address,
            &self.get_ata_for(to),
            from,
            &[],
            amount,
            self.mint_decimals,
        )?)
    }

    pub async fn get_balance_for<C: DaoConnection>(
        &self,
        conn: &C,
        owner: &Address,
    ) -> anyhow::Result<u64> {
        match conn.fetch_account(&self.get_ata_for(owner)).await? {
            Some(account) => Ok(Account::unpack(&account.data)?.amount),
            None => Ok(0),
        }
    }
}

//! In-memory ledger and account fixtures for unit tests

use super::LedgerClient;
use crate::error::RpcError;
use crate::layout::{self, amm_v4, market_v3, token_account};
use crate::models::{Blockhash, PoolIdentity, PoolState, SignatureStatus, TokenAmount};
use crate::pubkey::{self, WSOL_MINT};
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Deterministic, distinct key per seed
pub fn key(seed: u8) -> String {
    pubkey::encode(&[seed; 32])
}

fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_key(buf: &mut [u8], offset: usize, key: &str) {
    buf[offset..offset + 32].copy_from_slice(&pubkey::decode(key).unwrap());
}

/// Market account whose event queue, bids and asks are `key(seed..seed+3)`
pub fn market_bytes(seed: u8) -> Vec<u8> {
    let mut data = vec![0u8; layout::MARKET_V3_SIZE];
    put_key(&mut data, market_v3::EVENT_QUEUE, &key(seed));
    put_key(&mut data, market_v3::BIDS, &key(seed + 1));
    put_key(&mut data, market_v3::ASKS, &key(seed + 2));
    data
}

pub fn token_account_bytes(mint: &str, owner: &str, amount: u64) -> Vec<u8> {
    let mut data = vec![0u8; layout::TOKEN_ACCOUNT_SIZE];
    put_key(&mut data, token_account::MINT, mint);
    put_key(&mut data, token_account::OWNER, owner);
    put_u64(&mut data, token_account::AMOUNT, amount);
    data
}

pub fn mint_bytes(mint_authority: Option<&str>, freeze_authority: Option<&str>, supply: u64) -> Vec<u8> {
    let mut data = vec![0u8; layout::MINT_SIZE];
    if let Some(authority) = mint_authority {
        data[0..4].copy_from_slice(&1u32.to_le_bytes());
        put_key(&mut data, 4, authority);
    }
    put_u64(&mut data, 36, supply);
    data[44] = 6;
    data[45] = 1;
    if let Some(authority) = freeze_authority {
        data[46..50].copy_from_slice(&1u32.to_le_bytes());
        put_key(&mut data, 50, authority);
    }
    data
}

/// A pool quoted in wrapped SOL, with every address derived from a seed
#[derive(Debug, Clone)]
pub struct PoolFixture {
    pub seed: u8,
    pub pool_id: String,
    pub base_mint: String,
    pub quote_mint: String,
    pub base_vault: String,
    pub quote_vault: String,
    pub lp_mint: String,
    pub market_id: String,
    pub pool_open_time: u64,
    pub lp_reserve: u64,
}

impl PoolFixture {
    pub fn new(seed: u8) -> Self {
        Self {
            seed,
            pool_id: key(seed),
            base_mint: key(seed + 1),
            quote_mint: WSOL_MINT.to_string(),
            base_vault: key(seed + 2),
            quote_vault: key(seed + 3),
            lp_mint: key(seed + 4),
            market_id: key(seed + 5),
            pool_open_time: 1_700_000_000,
            lp_reserve: 1_000_000_000_000,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; layout::AMM_V4_SIZE];
        put_u64(&mut data, amm_v4::STATUS, 6);
        put_u64(&mut data, amm_v4::BASE_DECIMAL, 6);
        put_u64(&mut data, amm_v4::QUOTE_DECIMAL, 9);
        put_u64(&mut data, amm_v4::POOL_OPEN_TIME, self.pool_open_time);
        put_key(&mut data, amm_v4::BASE_VAULT, &self.base_vault);
        put_key(&mut data, amm_v4::QUOTE_VAULT, &self.quote_vault);
        put_key(&mut data, amm_v4::BASE_MINT, &self.base_mint);
        put_key(&mut data, amm_v4::QUOTE_MINT, &self.quote_mint);
        put_key(&mut data, amm_v4::LP_MINT, &self.lp_mint);
        put_key(&mut data, amm_v4::MARKET_ID, &self.market_id);
        put_key(&mut data, amm_v4::MARKET_PROGRAM_ID, pubkey::OPENBOOK_PROGRAM_ID);
        put_u64(&mut data, amm_v4::LP_RESERVE, self.lp_reserve);
        data
    }

    pub fn state(&self) -> PoolState {
        layout::decode_pool_state(&self.bytes()).unwrap()
    }

    pub fn identity(&self) -> PoolIdentity {
        self.state().identity(&self.pool_id)
    }

    /// Register the pool, both vaults and its market with the ledger
    pub fn install(&self, ledger: &FakeLedger, base_reserve: u64, quote_reserve: u64) {
        ledger.set_account(&self.pool_id, self.bytes());
        ledger.set_vault(self, base_reserve, quote_reserve);
        ledger.set_account(&self.market_id, market_bytes(self.seed + 6));
    }
}

/// Scriptable `LedgerClient`.
/// `send_transaction` echoes the payload back as the signature.
#[derive(Default)]
pub struct FakeLedger {
    accounts: Mutex<HashMap<String, Vec<u8>>>,
    supplies: Mutex<HashMap<String, std::result::Result<TokenAmount, i64>>>,
    balances: Mutex<HashMap<String, u64>>,
    statuses: Mutex<HashMap<String, SignatureStatus>>,
    sent: Mutex<Vec<String>>,
    block_height: AtomicU64,
    reads: AtomicUsize,
    offline: AtomicBool,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&self, address: &str, data: Vec<u8>) {
        self.accounts.lock().insert(address.to_string(), data);
    }

    pub fn set_vault(&self, pool: &PoolFixture, base_reserve: u64, quote_reserve: u64) {
        let owner = key(250);
        self.set_account(
            &pool.base_vault,
            token_account_bytes(&pool.base_mint, &owner, base_reserve),
        );
        self.set_account(
            &pool.quote_vault,
            token_account_bytes(&pool.quote_mint, &owner, quote_reserve),
        );
        self.balances.lock().insert(pool.quote_vault.clone(), quote_reserve);
    }

    pub fn set_supply(&self, mint: &str, supply: u64) {
        self.set_supply_with_decimals(mint, supply, 9);
    }

    pub fn set_supply_with_decimals(&self, mint: &str, supply: u64, decimals: u8) {
        let amount = TokenAmount {
            amount: supply,
            decimals,
        };
        self.supplies.lock().insert(mint.to_string(), Ok(amount));
    }

    pub fn set_supply_error(&self, mint: &str, code: i64) {
        self.supplies.lock().insert(mint.to_string(), Err(code));
    }

    pub fn set_balance(&self, account: &str, amount: u64) {
        self.balances.lock().insert(account.to_string(), amount);
    }

    pub fn set_status(&self, signature: &str, status: SignatureStatus) {
        self.statuses.lock().insert(signature.to_string(), status);
    }

    pub fn set_block_height(&self, height: u64) {
        self.block_height.store(height, Ordering::SeqCst);
    }

    /// Every call fails with a transport-like error while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn account_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RpcError::Response("node unreachable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn get_account_data(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().get(address).cloned())
    }

    async fn get_multiple_accounts(&self, addresses: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock();
        Ok(addresses.iter().map(|a| accounts.get(a).cloned()).collect())
    }

    async fn get_token_supply(&self, mint: &str) -> Result<TokenAmount> {
        self.check_online()?;
        match self.supplies.lock().get(mint) {
            Some(Ok(amount)) => Ok(*amount),
            Some(Err(code)) => Err(RpcError::Rpc {
                code: *code,
                message: "scripted failure".to_string(),
            }
            .into()),
            None => Err(RpcError::Response(format!("no supply for {}", mint)).into()),
        }
    }

    async fn get_token_account_balance(&self, account: &str) -> Result<TokenAmount> {
        self.check_online()?;
        let amount = self
            .balances
            .lock()
            .get(account)
            .copied()
            .ok_or_else(|| RpcError::Response(format!("could not find account {}", account)))?;
        Ok(TokenAmount { amount, decimals: 9 })
    }

    async fn get_latest_blockhash(&self) -> Result<Blockhash> {
        self.check_online()?;
        Ok(Blockhash {
            blockhash: key(251),
            last_valid_block_height: self.block_height.load(Ordering::SeqCst) + 150,
        })
    }

    async fn get_block_height(&self) -> Result<u64> {
        self.check_online()?;
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn send_transaction(&self, encoded: &str) -> Result<String> {
        self.check_online()?;
        self.sent.lock().push(encoded.to_string());
        Ok(encoded.to_string())
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        self.check_online()?;
        Ok(self.statuses.lock().get(signature).cloned())
    }
}

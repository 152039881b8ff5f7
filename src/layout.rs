//! Fixed-offset decoders for the account layouts the bot reads
//!
//! Only the fields the controller and filters need are decoded; the rest
//! of each account is ignored.

use crate::error::LayoutError;
use crate::models::{MarketDescriptor, MintInfo, PoolState, TokenAccount, TokenMetadata};
use crate::pubkey;

pub const AMM_V4_SIZE: usize = 752;
pub const TOKEN_ACCOUNT_SIZE: usize = 165;
pub const MINT_SIZE: usize = 82;
pub const MARKET_V3_SIZE: usize = 388;

/// Offsets into the AMM v4 pool account
pub mod amm_v4 {
    pub const STATUS: usize = 0;
    pub const BASE_DECIMAL: usize = 32;
    pub const QUOTE_DECIMAL: usize = 40;
    pub const POOL_OPEN_TIME: usize = 224;
    pub const BASE_VAULT: usize = 336;
    pub const QUOTE_VAULT: usize = 368;
    pub const BASE_MINT: usize = 400;
    pub const QUOTE_MINT: usize = 432;
    pub const LP_MINT: usize = 464;
    pub const MARKET_ID: usize = 528;
    pub const MARKET_PROGRAM_ID: usize = 560;
    pub const LP_RESERVE: usize = 720;
}

/// Offsets into the OpenBook v3 market account
pub mod market_v3 {
    pub const BASE_MINT: usize = 53;
    pub const QUOTE_MINT: usize = 85;
    pub const EVENT_QUEUE: usize = 253;
    pub const BIDS: usize = 285;
    pub const ASKS: usize = 317;
}

/// Offsets into the SPL token account
pub mod token_account {
    pub const MINT: usize = 0;
    pub const OWNER: usize = 32;
    pub const AMOUNT: usize = 64;
}

struct Reader<'a> {
    layout: &'static str,
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(layout: &'static str, data: &'a [u8], min_len: usize) -> Result<Self, LayoutError> {
        if data.len() < min_len {
            return Err(LayoutError::TooShort {
                layout,
                expected: min_len,
                actual: data.len(),
            });
        }
        Ok(Self { layout, data })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], LayoutError> {
        self.data
            .get(offset..offset + len)
            .ok_or(LayoutError::TooShort {
                layout: self.layout,
                expected: offset + len,
                actual: self.data.len(),
            })
    }

    fn u8(&self, offset: usize) -> Result<u8, LayoutError> {
        Ok(self.slice(offset, 1)?[0])
    }

    fn u16(&self, offset: usize) -> Result<u16, LayoutError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.slice(offset, 2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn u32(&self, offset: usize) -> Result<u32, LayoutError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.slice(offset, 4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&self, offset: usize) -> Result<u64, LayoutError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.slice(offset, 8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn pubkey(&self, offset: usize) -> Result<String, LayoutError> {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(self.slice(offset, 32)?);
        Ok(pubkey::encode(&buf))
    }

    /// Borsh string: u32 length prefix, then bytes. Trailing NULs are stripped.
    /// Returns the string and the offset just past it.
    fn string(&self, offset: usize, field: &'static str) -> Result<(String, usize), LayoutError> {
        let len = self.u32(offset)? as usize;
        let bytes = self.slice(offset + 4, len)?;
        let value = std::str::from_utf8(bytes)
            .map_err(|_| LayoutError::InvalidString {
                layout: self.layout,
                field,
            })?
            .trim_end_matches('\0')
            .to_string();
        Ok((value, offset + 4 + len))
    }
}

/// Decode an AMM v4 liquidity pool account
pub fn decode_pool_state(data: &[u8]) -> Result<PoolState, LayoutError> {
    let r = Reader::new("amm_v4", data, AMM_V4_SIZE)?;

    Ok(PoolState {
        status: r.u64(amm_v4::STATUS)?,
        base_decimals: r.u64(amm_v4::BASE_DECIMAL)? as u8,
        quote_decimals: r.u64(amm_v4::QUOTE_DECIMAL)? as u8,
        pool_open_time: r.u64(amm_v4::POOL_OPEN_TIME)?,
        base_vault: r.pubkey(amm_v4::BASE_VAULT)?,
        quote_vault: r.pubkey(amm_v4::QUOTE_VAULT)?,
        base_mint: r.pubkey(amm_v4::BASE_MINT)?,
        quote_mint: r.pubkey(amm_v4::QUOTE_MINT)?,
        lp_mint: r.pubkey(amm_v4::LP_MINT)?,
        market_id: r.pubkey(amm_v4::MARKET_ID)?,
        market_program_id: r.pubkey(amm_v4::MARKET_PROGRAM_ID)?,
        lp_reserve: r.u64(amm_v4::LP_RESERVE)?,
    })
}

pub fn decode_token_account(data: &[u8]) -> Result<TokenAccount, LayoutError> {
    let r = Reader::new("token_account", data, TOKEN_ACCOUNT_SIZE)?;

    Ok(TokenAccount {
        mint: r.pubkey(token_account::MINT)?,
        owner: r.pubkey(token_account::OWNER)?,
        amount: r.u64(token_account::AMOUNT)?,
    })
}

/// Decode an SPL mint. `COption` tags are u32; any non-zero tag means present.
pub fn decode_mint(data: &[u8]) -> Result<MintInfo, LayoutError> {
    let r = Reader::new("mint", data, MINT_SIZE)?;

    let mint_authority = match r.u32(0)? {
        0 => None,
        _ => Some(r.pubkey(4)?),
    };
    let freeze_authority = match r.u32(46)? {
        0 => None,
        _ => Some(r.pubkey(50)?),
    };

    Ok(MintInfo {
        mint_authority,
        supply: r.u64(36)?,
        decimals: r.u8(44)?,
        freeze_authority,
    })
}

pub fn decode_market(data: &[u8]) -> Result<MarketDescriptor, LayoutError> {
    let r = Reader::new("market_v3", data, MARKET_V3_SIZE)?;

    Ok(MarketDescriptor {
        event_queue: r.pubkey(market_v3::EVENT_QUEUE)?,
        bids: r.pubkey(market_v3::BIDS)?,
        asks: r.pubkey(market_v3::ASKS)?,
    })
}

/// Decode a token metadata account up to `is_mutable`
pub fn decode_metadata(data: &[u8]) -> Result<TokenMetadata, LayoutError> {
    let r = Reader::new("metadata", data, 1 + 32 + 32)?;

    let update_authority = r.pubkey(1)?;
    let mint = r.pubkey(33)?;
    let (name, next) = r.string(65, "name")?;
    let (symbol, next) = r.string(next, "symbol")?;
    let (uri, next) = r.string(next, "uri")?;

    let _seller_fee_bps = r.u16(next)?;
    let mut offset = next + 2;

    if r.u8(offset)? == 1 {
        let count = r.u32(offset + 1)? as usize;
        // address + verified + share
        offset += 1 + 4 + count * 34;
    } else {
        offset += 1;
    }

    // primary_sale_happened, then is_mutable
    let is_mutable = r.u8(offset + 1)? != 0;

    Ok(TokenMetadata {
        update_authority,
        mint,
        name,
        symbol,
        uri,
        is_mutable,
    })
}

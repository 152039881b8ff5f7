//! Base58 public keys and program-derived addresses
//!
//! Keys travel through the crate as base58 strings, the form the RPC
//! node speaks. Raw bytes only appear while decoding account layouts.

use crate::error::LayoutError;
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

pub const AMM_V4_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const OPENBOOK_PROGRAM_ID: &str = "srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX";
pub const METADATA_PROGRAM_ID: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qVxEKYR8RfS8ZfvkyDL9t3GWHa";

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";
const MAX_SEED_LEN: usize = 32;

pub fn encode(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

pub fn decode(key: &str) -> Result<[u8; 32], LayoutError> {
    let bytes = bs58::decode(key)
        .into_vec()
        .map_err(|_| LayoutError::InvalidPubkey(key.to_string()))?;

    bytes
        .try_into()
        .map_err(|_| LayoutError::InvalidPubkey(key.to_string()))
}

/// True when the bytes decompress to a point on the ed25519 curve
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

/// Derive a program address for the given seeds, searching bumps from 255 down.
/// Returns the address and the bump that produced it.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), LayoutError> {
    if seeds.iter().any(|s| s.len() > MAX_SEED_LEN) {
        return Err(LayoutError::InvalidPubkey("seed longer than 32 bytes".to_string()));
    }

    for bump in (0..=u8::MAX).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id);
        hasher.update(PDA_MARKER);

        let candidate: [u8; 32] = hasher.finalize().into();
        if !is_on_curve(&candidate) {
            return Ok((candidate, bump));
        }
    }

    Err(LayoutError::InvalidPubkey(
        "no viable bump for program address".to_string(),
    ))
}

/// Metadata account address for a mint: seeds `["metadata", program, mint]`
pub fn metadata_address(mint: &str) -> Result<String, LayoutError> {
    let program = decode(METADATA_PROGRAM_ID)?;
    let mint = decode(mint)?;

    let (address, _) = find_program_address(&[b"metadata", &program, &mint], &program)?;
    Ok(encode(&address))
}

/// Associated token account of `owner` for `mint`
pub fn associated_token_address(owner: &str, mint: &str) -> Result<String, LayoutError> {
    let program = decode(ASSOCIATED_TOKEN_PROGRAM_ID)?;
    let token_program = decode(TOKEN_PROGRAM_ID)?;
    let owner = decode(owner)?;
    let mint = decode(mint)?;

    let (address, _) = find_program_address(&[&owner, &token_program, &mint], &program)?;
    Ok(encode(&address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_ids_decode() {
        for id in [
            AMM_V4_PROGRAM_ID,
            OPENBOOK_PROGRAM_ID,
            METADATA_PROGRAM_ID,
            TOKEN_PROGRAM_ID,
            ASSOCIATED_TOKEN_PROGRAM_ID,
            WSOL_MINT,
            USDC_MINT,
        ] {
            let bytes = decode(id).unwrap();
            assert_eq!(encode(&bytes), id);
        }
    }

    #[test]
    fn test_decode_rejects_bad_keys() {
        assert!(decode("not-base58-0OIl").is_err());
        // valid base58, wrong length
        assert!(decode("3yZe7d").is_err());
    }

    #[test]
    fn test_metadata_address_is_off_curve_and_stable() {
        let first = metadata_address(WSOL_MINT).unwrap();
        let second = metadata_address(WSOL_MINT).unwrap();
        assert_eq!(first, second);

        let bytes = decode(&first).unwrap();
        assert!(!is_on_curve(&bytes));

        let other = metadata_address(USDC_MINT).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_associated_token_address_depends_on_owner_and_mint() {
        let a = associated_token_address(AMM_V4_PROGRAM_ID, WSOL_MINT).unwrap();
        let b = associated_token_address(AMM_V4_PROGRAM_ID, USDC_MINT).unwrap();
        let c = associated_token_address(OPENBOOK_PROGRAM_ID, WSOL_MINT).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(!is_on_curve(&decode(&a).unwrap()));
    }

    #[test]
    fn test_seed_length_is_bounded() {
        let program = decode(METADATA_PROGRAM_ID).unwrap();
        let long_seed = [7u8; 33];
        assert!(find_program_address(&[&long_seed], &program).is_err());
    }
}

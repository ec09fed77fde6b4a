use crate::tx::ScriptPublicKey;
use thiserror::Error;

/// The maximum length of the miner's script public key inside a coinbase payload
pub const MAX_COINBASE_PAYLOAD_SCRIPT_PUBLIC_KEY_LEN: usize = 150;

/// The maximum overall length of a coinbase payload
pub const MAX_COINBASE_PAYLOAD_LEN: usize = 204;

const MIN_PAYLOAD_LEN: usize = 8 + 8 + 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinbaseError {
    #[error("coinbase payload length is {0} while the minimum allowed length is {1}")]
    PayloadLenBelowMin(usize, usize),

    #[error("coinbase payload length is {0} while the maximum allowed length is {1}")]
    PayloadLenAboveMax(usize, usize),

    #[error("coinbase payload script public key length is {0} while the maximum allowed length is {1}")]
    PayloadScriptPublicKeyLenAboveMax(usize, usize),

    #[error("coinbase payload script public key is shorter than its declared length")]
    PayloadCantContainScriptPublicKey,
}

pub type CoinbaseResult<T> = std::result::Result<T, CoinbaseError>;

/// The data the node's miner wants embedded in coinbase transactions it may mine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerData {
    pub script_public_key: ScriptPublicKey,
    pub extra_data: Vec<u8>,
}

impl MinerData {
    pub fn new(script_public_key: ScriptPublicKey, extra_data: Vec<u8>) -> Self {
        Self { script_public_key, extra_data }
    }
}

/// The structured form of a coinbase payload:
/// `blue_score (u64) || subsidy (u64) || script len (u8) || script_public_key || extra data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseData {
    pub blue_score: u64,
    pub subsidy: u64,
    pub miner_data: MinerData,
}

pub fn serialize_coinbase_payload(data: &CoinbaseData) -> CoinbaseResult<Vec<u8>> {
    if data.miner_data.script_public_key.len() > MAX_COINBASE_PAYLOAD_SCRIPT_PUBLIC_KEY_LEN {
        return Err(CoinbaseError::PayloadScriptPublicKeyLenAboveMax(
            data.miner_data.script_public_key.len(),
            MAX_COINBASE_PAYLOAD_SCRIPT_PUBLIC_KEY_LEN,
        ));
    }
    let mut payload = Vec::with_capacity(MIN_PAYLOAD_LEN + data.miner_data.script_public_key.len() + data.miner_data.extra_data.len());
    payload.extend(data.blue_score.to_le_bytes());
    payload.extend(data.subsidy.to_le_bytes());
    payload.push(data.miner_data.script_public_key.len() as u8);
    payload.extend(&data.miner_data.script_public_key);
    payload.extend(&data.miner_data.extra_data);
    if payload.len() > MAX_COINBASE_PAYLOAD_LEN {
        return Err(CoinbaseError::PayloadLenAboveMax(payload.len(), MAX_COINBASE_PAYLOAD_LEN));
    }
    Ok(payload)
}

pub fn deserialize_coinbase_payload(payload: &[u8]) -> CoinbaseResult<CoinbaseData> {
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(CoinbaseError::PayloadLenBelowMin(payload.len(), MIN_PAYLOAD_LEN));
    }
    if payload.len() > MAX_COINBASE_PAYLOAD_LEN {
        return Err(CoinbaseError::PayloadLenAboveMax(payload.len(), MAX_COINBASE_PAYLOAD_LEN));
    }
    let blue_score = u64::from_le_bytes(payload[0..8].try_into().unwrap());
    let subsidy = u64::from_le_bytes(payload[8..16].try_into().unwrap());
    let script_len = payload[16] as usize;
    if script_len > MAX_COINBASE_PAYLOAD_SCRIPT_PUBLIC_KEY_LEN {
        return Err(CoinbaseError::PayloadScriptPublicKeyLenAboveMax(script_len, MAX_COINBASE_PAYLOAD_SCRIPT_PUBLIC_KEY_LEN));
    }
    if payload.len() < MIN_PAYLOAD_LEN + script_len {
        return Err(CoinbaseError::PayloadCantContainScriptPublicKey);
    }
    let script_public_key = payload[17..17 + script_len].to_vec();
    let extra_data = payload[17 + script_len..].to_vec();
    Ok(CoinbaseData { blue_score, subsidy, miner_data: MinerData::new(script_public_key, extra_data) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let data = CoinbaseData {
            blue_score: 1234,
            subsidy: 50 * crate::constants::MOTES_PER_NORN,
            miner_data: MinerData::new(vec![0x20; 34], vec![1, 2, 3]),
        };
        let payload = serialize_coinbase_payload(&data).unwrap();
        assert_eq!(deserialize_coinbase_payload(&payload).unwrap(), data);
    }

    #[test]
    fn test_payload_too_short() {
        assert_eq!(deserialize_coinbase_payload(&[0; 5]), Err(CoinbaseError::PayloadLenBelowMin(5, MIN_PAYLOAD_LEN)));
    }

    #[test]
    fn test_payload_truncated_script() {
        let data = CoinbaseData { blue_score: 0, subsidy: 0, miner_data: MinerData::new(vec![7; 30], vec![]) };
        let mut payload = serialize_coinbase_payload(&data).unwrap();
        payload.truncate(payload.len() - 10);
        assert_eq!(deserialize_coinbase_payload(&payload), Err(CoinbaseError::PayloadCantContainScriptPublicKey));
    }

    #[test]
    fn test_oversized_script_rejected() {
        let data = CoinbaseData { blue_score: 0, subsidy: 0, miner_data: MinerData::new(vec![7; 151], vec![]) };
        assert!(matches!(serialize_coinbase_payload(&data), Err(CoinbaseError::PayloadScriptPublicKeyLenAboveMax(151, _))));
    }
}

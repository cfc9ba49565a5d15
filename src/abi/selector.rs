//! Function selector calculation

use sha3::{Digest, Keccak256};

/// First 4 bytes of keccak256 of a canonical function signature
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selectors of the calls the bridge builds
pub struct KnownSelectors;

impl KnownSelectors {
    pub const DEPOSIT_ETH: [u8; 4] = [0x17, 0xc8, 0x19, 0xc4]; // depositEth(bytes32,bytes32)
    pub const DEPOSIT_ERC20: [u8; 4] = [0xdb, 0x97, 0x51, 0xaf]; // depositErc20(address,uint256,bytes32,bytes32)
    pub const APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3]; // approve(address,uint256)
    pub const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb]; // transfer(address,uint256)

    pub fn identify(selector: &[u8; 4]) -> Option<&'static str> {
        match *selector {
            Self::DEPOSIT_ETH => Some("depositEth(bytes32,bytes32)"),
            Self::DEPOSIT_ERC20 => Some("depositErc20(address,uint256,bytes32,bytes32)"),
            Self::APPROVE => Some("approve(address,uint256)"),
            Self::TRANSFER => Some("transfer(address,uint256)"),
            _ => None,
        }
    }
}

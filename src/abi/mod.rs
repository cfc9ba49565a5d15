//! Contract call encoding for the deposit helper and ERC-20 tokens
//!
//! Only the four calls the bridge makes are supported, all of them built
//! from static 32-byte words:
//! - `depositEth(bytes32,bytes32)`
//! - `depositErc20(address,uint256,bytes32,bytes32)`
//! - `approve(address,uint256)`
//! - `transfer(address,uint256)`

pub mod calldata;
pub mod selector;

pub use calldata::*;
pub use selector::*;

//! Transaction module
//!
//! Building, canonical encoding, digesting and verified assembly of
//! EIP-1559 transactions.

pub mod assembler;
pub mod builder;
pub mod encoder;
pub mod rlp;
pub mod types;


pub use assembler::{assemble_signed_tx, recover_sender, DecodedSigned};
pub use builder::{GasPolicy, TransactionBuilder, TxDestination, TxRequest};
pub use encoder::{compute_digest, encode_signed, encode_unsigned, prepare, transaction_hash};
pub use types::*;

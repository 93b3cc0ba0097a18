//! Keys, signers and composite key structures

pub mod key;
pub mod key_list;
pub mod signer;

pub use key::{KeyAlgorithm, PrivateKey, PublicKey};
pub use key_list::{Key, KeyList, SignatureMap};
pub use signer::Signer;

pub mod signature;

pub use signature::{compute_signature, sign, SignatureVerifier};

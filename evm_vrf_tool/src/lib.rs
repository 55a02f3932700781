//! Batch tooling for [`evm_vrf`]: key files, proof CSVs, and worker pools that fill and check
//! them.
pub mod batch;
pub mod keyfile;
pub mod row;

pub use batch::{GenerateConfig, default_workers, generate, nonce_ranges, verify};
pub use row::{HEADER, ProofRow};

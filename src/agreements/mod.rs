//! B2B lifecycle engines for roaming agreements and infrastructure contracts.
//!
//! PENDING -> ACTIVE -> (SUSPENDED <-> ACTIVE) -> TERMINATED | EXPIRED.
//! Every accepted command appends exactly one new version with the same id.

pub mod infrastructure;
pub mod roaming;

pub use infrastructure::{
    new_contract, step as contract_step, ContractCommand, ContractEffects, ContractRegistry, NewContract,
};
pub use roaming::{
    new_agreement, step as agreement_step, AgreementCommand, AgreementEffects, AgreementRegistry, NewAgreement,
};

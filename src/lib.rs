// src/lib.rs

pub mod models {
    pub mod explorer;
    pub mod reconciliation;
    pub mod transfer;
}

pub mod services {
    pub mod amount;
    pub mod export;
    pub mod hash;
    pub mod ledger;
    pub mod normalizer;
    pub mod price;
    pub mod reconciliation;
    pub mod tronscan;
}

//! Simulated order and reference-data collaborator

mod paper;

pub use paper::{limit_up_price, FailureInjection, PaperBroker, PaperBrokerConfig, PaperOrder, MAIN_BOARD_LIMIT};

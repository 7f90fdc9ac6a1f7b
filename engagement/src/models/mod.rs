pub mod interaction;
pub mod ledger_row;

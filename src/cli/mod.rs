pub mod convert;
pub mod history;
pub mod rates;
pub mod setup;
pub mod ui;
pub mod units;

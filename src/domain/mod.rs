pub mod payment;
pub mod transaction;
pub mod wallet;

pub use payment::Payment;
pub use transaction::{Transaction, TxStatus, TxType};
pub use wallet::Wallet;

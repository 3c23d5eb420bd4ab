pub mod payments;
pub mod wallets;

pub use payments::{PaymentService, ProcessPaymentRequest, ProcessPaymentResponse};
pub use wallets::WalletService;

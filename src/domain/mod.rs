//! Framework-agnostic domain entities.

pub mod chain;
pub mod fee;
pub mod order;
pub mod payment_request;

pub use chain::{pair_label, AddressFamily, Chain};
pub use fee::PlatformFee;
pub use order::{Order, OrderStatus, StatusUpdate};
pub use payment_request::{PaymentRequest, PaymentRequestStatus, PaymentRequestSummary};

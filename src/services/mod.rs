pub mod deposit;
pub mod fees;
pub mod rate_solver;
pub mod registry;
pub mod retry;
pub mod status_sync;

pub use deposit::{AcquiredDeposit, DepositOrchestrator};
pub use fees::{FeeBreakdown, FeeCalculator};
pub use rate_solver::{RateQuoteSolver, ReverseQuote};
pub use registry::build_providers;
pub use retry::RetryPolicy;
pub use status_sync::OrderStatusSynchronizer;

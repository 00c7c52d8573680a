pub mod create_order;
pub mod quote_rate;

pub use create_order::{CreateOrder, CreateOrderInput, CreateOrderOutput};
pub use quote_rate::{QuoteDirection, QuoteRate, QuoteRateInput, QuoteRateOutput};

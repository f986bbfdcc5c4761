mod executor;
mod tokens;

pub use executor::TransferExecutor;
pub use tokens::TokenGrid;

mod order_source;

pub use order_source::OrderSource;
pub use order_source::OrderToken;
pub use order_source::SequentialOrderSource;

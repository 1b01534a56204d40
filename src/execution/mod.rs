// Order execution and candle collection module
pub mod broker;
pub mod candle_window;

pub use broker::{BrokerConfig, Fill, SimBroker, TradeRecord};
pub use candle_window::CandleWindow;

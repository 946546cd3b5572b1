// Price and return series
pub mod price_bar;
pub mod returns;

pub use price_bar::{PriceBar, SymbolSpec};
pub use returns::{ReturnPoint, ReturnSeries, Split};

pub mod caching;
pub mod exchange_rate;
pub mod util;

pub use caching::{CachingRateProvider, RateProviderOptions};
pub use exchange_rate::ExchangeRateApiProvider;

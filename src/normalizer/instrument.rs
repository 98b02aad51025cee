//! Instrument fields shared by every source

use serde_json::Value;
use tracing::warn;

use super::fields::{as_number, as_string, as_text, optional, required, FieldSpec};
use crate::common::errors::ValidationError;
use crate::context::Instrument;

pub const SYMBOL: FieldSpec = FieldSpec {
    name: "symbol",
    paths: &[
        "symbol",
        "ticker",
        "instrument.symbol",
        "instrument.ticker",
        "market.symbol",
        "meta.ticker",
        "signal.symbol",
        "signal.ticker",
    ],
};

pub const EXCHANGE: FieldSpec = FieldSpec {
    name: "exchange",
    paths: &["exchange", "instrument.exchange", "market.exchange", "meta.exchange"],
};

pub const PRICE: FieldSpec = FieldSpec {
    name: "price",
    paths: &[
        "price",
        "current_price",
        "currentPrice",
        "close",
        "instrument.price",
        "market.price",
        "signal.price",
        "signal.entry",
        "last",
    ],
};

/// Extract the instrument; symbol is required, price and exchange are not
pub fn extract_instrument(payload: &Value, errors: &mut ValidationError) -> Option<Instrument> {
    let symbol = required(payload, &SYMBOL, as_text, errors)?;
    let mut instrument = Instrument::new(symbol);

    if let Some(price) = optional(payload, &PRICE, as_number, errors) {
        if price > 0.0 {
            instrument.price = Some(price);
        } else {
            warn!("Ignoring non-positive price {} for {}", price, instrument.symbol);
        }
    }
    instrument.exchange = optional(payload, &EXCHANGE, as_string, errors);
    Some(instrument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_instrument_variant() {
        let mut errors = ValidationError::default();
        let instrument = extract_instrument(
            &json!({"instrument": {"ticker": "nasdaq:aapl", "exchange": "NASDAQ"}, "close": "189.5"}),
            &mut errors,
        )
        .unwrap();

        assert!(errors.is_empty());
        assert_eq!(instrument.symbol, "AAPL");
        assert_eq!(instrument.exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(instrument.price, Some(189.5));
    }

    #[test]
    fn test_non_positive_price_is_dropped() {
        let mut errors = ValidationError::default();
        let instrument =
            extract_instrument(&json!({"symbol": "SPY", "price": 0}), &mut errors).unwrap();
        assert!(errors.is_empty());
        assert_eq!(instrument.price, None);
    }
}

//! Price scaling helpers between `f64` prices and fixed-decimal minor units.

use crate::orderbook::Price;

/// Scale an `f64` price to minor units for a security with the given
/// number of decimal places. The caller validates sign and finiteness.
pub fn scale_price(price: f64, decimal_places: u32) -> Price {
    let factor = 10f64.powi(decimal_places as i32);
    (price * factor).round() as Price
}

/// Convert a minor-unit price back to an `f64`.
pub fn unscale_price(price: Price, decimal_places: u32) -> f64 {
    let factor = 10f64.powi(decimal_places as i32);
    price as f64 / factor
}

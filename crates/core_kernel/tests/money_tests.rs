//! Money tests focused on the conversions fraud features depend on

use core_kernel::{Currency, Money, MoneyError};
use rust_decimal_macros::dec;

#[test]
fn test_to_f64_preserves_value() {
    let m = Money::new(dec!(150000.00), Currency::USD);
    assert_eq!(m.to_f64().unwrap(), 150_000.0);
}

#[test]
fn test_smoothed_ratio_with_zero_premium() {
    let claim = Money::new(dec!(250), Currency::GBP);
    assert_eq!(claim.smoothed_ratio_to(&Money::zero(Currency::GBP)).unwrap(), 250.0);
}

#[test]
fn test_smoothed_ratio_currency_mismatch() {
    let a = Money::new(dec!(100), Currency::GBP);
    let b = Money::new(dec!(50), Currency::USD);
    assert_eq!(
        a.smoothed_ratio_to(&b),
        Err(MoneyError::CurrencyMismatch("GBP".to_string(), "USD".to_string()))
    );
}

#[test]
fn test_display() {
    let m = Money::new(dec!(1234.5), Currency::CAD);
    assert_eq!(m.to_string(), "1234.50 CAD");
}

#[test]
fn test_serde_shape() {
    let m = Money::new(dec!(10), Currency::USD);
    let json = serde_json::to_value(m).unwrap();
    assert_eq!(json["currency"], "USD");
}

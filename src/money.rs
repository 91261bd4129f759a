//! Fixed-point money.
//!
//! Every amount that is compared, summed or sent to the backend goes through
//! `to_money` first, so the allocation invariants hold at cent precision.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

// I decided to use a decimal library instead of the built-in f64 type, to be
// safer when dealing with money, and making the decimal precision easier to
// deal with.
pub type Amount = Decimal;
pub const MONEY_PRECISION: u32 = 2;

/// Round an amount to exactly two decimal places, half away from zero.
pub fn to_money(amount: Amount) -> Amount {
    amount.round_dp_with_strategy(MONEY_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a raw value into money. This never fails: anything that isn't a
/// number is worth zero.
pub fn parse_money(raw: &str) -> Amount {
    let raw = raw.trim();
    let amount = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or_default();

    to_money(amount)
}

/// Sub-cent residues are considered to be exactly zero.
pub fn is_zero_money(amount: Amount) -> bool {
    to_money(amount).abs() < Decimal::new(1, MONEY_PRECISION)
}

/// Sum amounts, rounded to cents. Stops at `Decimal::MAX` instead of
/// overflowing: backend amounts are not bounded.
pub fn sum_money(amounts: impl IntoIterator<Item = Amount>) -> Amount {
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .unwrap_or(Decimal::MAX);

    to_money(total)
}

fn from_f64(value: f64) -> Amount {
    to_money(Decimal::from_f64(value).unwrap_or_default())
}

/// Serde helpers for amounts coming from, and going to, the backend.
///
/// The backend is not consistent: amounts can be numbers, numeric strings or
/// null depending on the endpoint. Reading is lenient, writing always emits a
/// string with two decimals.
pub mod serde_money {
    use super::{from_f64, parse_money, to_money, Amount, MONEY_PRECISION};
    use rust_decimal::Decimal;
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        let mut amount = to_money(*amount);
        amount.rescale(MONEY_PRECISION);
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }

    struct MoneyVisitor;

    impl<'de> Visitor<'de> for MoneyVisitor {
        type Value = Amount;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a monetary amount")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Amount, E> {
            Ok(Decimal::from(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Amount, E> {
            Ok(Decimal::from(value))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Amount, E> {
            Ok(from_f64(value))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Amount, E> {
            Ok(parse_money(value))
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Amount, E> {
            Ok(Decimal::ZERO)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
            Ok(Decimal::ZERO)
        }

        fn visit_none<E: de::Error>(self) -> Result<Amount, E> {
            Ok(Decimal::ZERO)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Amount, D::Error> {
            deserializer.deserialize_any(MoneyVisitor)
        }
    }
}

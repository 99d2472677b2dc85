//! IVA (Impuesto al Valor Agregado) arithmetic for El Salvador's 13% regime

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Statutory IVA rate, in percent
pub const VAT_RATE_PERCENT: u32 = 13;

/// IVA rate as a decimal fraction (0.13)
pub fn vat_rate() -> BigDecimal {
    BigDecimal::new(BigInt::from(VAT_RATE_PERCENT), 2)
}

/// Decimal zero
pub fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

/// Round to two decimals, halves away from zero
pub fn round2(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// IVA due on a taxable base
pub fn vat(base: &BigDecimal) -> BigDecimal {
    round2(&(base * vat_rate()))
}

/// Tolerant numeric coercion for user-edited text.
///
/// Every character outside `[0-9.-]` is dropped and the longest numeric
/// prefix of the remainder is parsed. Anything unparseable is zero.
pub fn to_number(raw: &str) -> BigDecimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    numeric_prefix(&cleaned)
        .and_then(|literal| BigDecimal::from_str(&literal).ok())
        .unwrap_or_else(zero)
}

fn numeric_prefix(cleaned: &str) -> Option<String> {
    let (sign, rest) = match cleaned.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", cleaned),
    };

    let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let int_part = &rest[..int_len];

    let frac_part = rest[int_len..]
        .strip_prefix('.')
        .map(|after| {
            let frac_len = after.bytes().take_while(u8::is_ascii_digit).count();
            &after[..frac_len]
        })
        .unwrap_or("");

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if frac_part.is_empty() {
        Some(format!("{sign}{int_part}"))
    } else {
        Some(format!("{sign}{int_part}.{frac_part}"))
    }
}

/// Base, tax and gross amounts of a single IVA computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvaCalculation {
    /// Taxable base (before IVA)
    pub base: BigDecimal,
    /// IVA amount
    pub iva: BigDecimal,
    /// Gross amount (base + IVA)
    pub total: BigDecimal,
}

impl IvaCalculation {
    /// Forward calculation: IVA is added on top of the base
    pub fn calculate(base: &BigDecimal) -> Self {
        let base = round2(base);
        let iva = vat(&base);
        let total = &base + &iva;
        Self { base, iva, total }
    }

    /// Reverse calculation: the gross amount already includes IVA.
    ///
    /// The base is rounded first and the IVA takes the remainder, so
    /// `base + iva` reproduces the rounded gross exactly.
    pub fn reverse_calculate(gross: &BigDecimal) -> Self {
        let total = round2(gross);
        let divisor = BigDecimal::from(1) + vat_rate();
        let base = round2(&(&total / divisor));
        let iva = round2(&(&total - &base));
        Self { base, iva, total }
    }
}

/// Serde adapter for money fields.
///
/// Writes JSON numbers. Reads numbers, numeric strings (coerced with
/// [`to_number`]) and `null` (zero), which is what hand-edited or older
/// snapshots contain.
pub mod serde_amount {
    use bigdecimal::{BigDecimal, ToPrimitive};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::{to_number, zero};

    pub fn serialize<S>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match amount.to_f64() {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(&amount.to_string()),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = BigDecimal;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number, a numeric string or null")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<BigDecimal, E> {
            if v.is_finite() {
                Ok(to_number(&v.to_string()))
            } else {
                Ok(zero())
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigDecimal, E> {
            Ok(to_number(v))
        }

        fn visit_unit<E: de::Error>(self) -> Result<BigDecimal, E> {
            Ok(zero())
        }

        fn visit_none<E: de::Error>(self) -> Result<BigDecimal, E> {
            Ok(zero())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_vat_is_rounded_thirteen_percent() {
        assert_eq!(vat(&dec("150")), dec("19.50"));
        assert_eq!(vat(&dec("100")), dec("13.00"));
        assert_eq!(vat(&dec("0")), dec("0"));
        // 0.13 * 10.05 = 1.3065
        assert_eq!(vat(&dec("10.05")), dec("1.31"));
        for base in ["0.01", "1.11", "999.99", "12345.675"] {
            let b = dec(base);
            assert_eq!(vat(&b), round2(&(&b * dec("0.13"))));
        }
    }

    #[test]
    fn test_round2_half_up_and_idempotent() {
        assert_eq!(round2(&dec("2.345")), dec("2.35"));
        assert_eq!(round2(&dec("2.344")), dec("2.34"));
        assert_eq!(round2(&dec("-2.345")), dec("-2.35"));
        for raw in ["1.005", "88.4999", "0.125", "7"] {
            let once = round2(&dec(raw));
            assert_eq!(round2(&once), once);
        }
    }

    #[test]
    fn test_to_number_is_tolerant() {
        assert_eq!(to_number("$1,234.50"), dec("1234.50"));
        assert_eq!(to_number(" 100.00 "), dec("100"));
        assert_eq!(to_number("-12.5"), dec("-12.5"));
        assert_eq!(to_number(".5"), dec("0.5"));
        assert_eq!(to_number("1.2.3"), dec("1.2"));
        assert_eq!(to_number("12-3"), dec("12"));
        assert_eq!(to_number("abc"), zero());
        assert_eq!(to_number(""), zero());
        assert_eq!(to_number("-"), zero());
    }

    #[test]
    fn test_forward_calculation() {
        let calc = IvaCalculation::calculate(&dec("150"));
        assert_eq!(calc.base, dec("150.00"));
        assert_eq!(calc.iva, dec("19.50"));
        assert_eq!(calc.total, dec("169.50"));
    }

    #[test]
    fn test_reverse_calculation() {
        let calc = IvaCalculation::reverse_calculate(&dec("113.00"));
        assert_eq!(calc.base, dec("100.00"));
        assert_eq!(calc.iva, dec("13.00"));
        assert_eq!(calc.total, dec("113.00"));
    }

    #[test]
    fn test_reverse_calculation_reconstructs_gross() {
        let tolerance = dec("0.01");
        for gross in ["0.01", "1.00", "9.99", "57.31", "113", "250.75", "1000000.03"] {
            let g = dec(gross);
            let calc = IvaCalculation::reverse_calculate(&g);
            let rebuilt = &calc.base + &calc.iva;
            assert!((&rebuilt - &g).abs() <= tolerance, "gross {gross}");
        }
    }

    #[test]
    fn test_serde_amount_accepts_numbers_strings_and_null() {
        #[derive(Deserialize, Serialize)]
        struct Holder {
            #[serde(with = "serde_amount")]
            value: BigDecimal,
        }

        let from_float: Holder = serde_json::from_str(r#"{"value": 169.5}"#).unwrap();
        assert_eq!(from_float.value, dec("169.5"));
        let from_text: Holder = serde_json::from_str(r#"{"value": "$1,000.10"}"#).unwrap();
        assert_eq!(from_text.value, dec("1000.10"));
        let from_null: Holder = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(from_null.value, zero());

        let json = serde_json::to_string(&Holder { value: dec("19.50") }).unwrap();
        assert_eq!(json, r#"{"value":19.5}"#);
    }
}

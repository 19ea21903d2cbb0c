//! # Money
//!
//! Amounts are stored as integer minor units (cents for USD). Every total
//! in the core (subtotal, tax, order total) is computed with integer
//! arithmetic; floating point only appears when rendering for the wire.

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the lowercase ISO 4217 code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
        }
    }

    /// Uppercase code, as the hosted gateway expects it
    pub fn code(&self) -> String {
        self.as_str().to_uppercase()
    }

    /// Parse a code in any case; unknown codes yield `None`
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "usd" => Some(Currency::USD),
            "eur" => Some(Currency::EUR),
            "gbp" => Some(Currency::GBP),
            "jpy" => Some(Currency::JPY),
            "cad" => Some(Currency::CAD),
            "aud" => Some(Currency::AUD),
            "chf" => Some(Currency::CHF),
            "mxn" => Some(Currency::MXN),
            _ => None,
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    fn scale(&self) -> i64 {
        10_i64.pow(self.decimal_places() as u32)
    }

    fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CAD => "C$",
            Currency::AUD => "A$",
            Currency::CHF => "CHF ",
            Currency::MXN => "MX$",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// An amount in the smallest unit of its currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in smallest currency unit (cents for USD)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Money {
    /// Create an amount from minor units
    pub fn from_minor(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }

    /// Convert a decimal major-unit amount (as a catalog or form would send it).
    ///
    /// Rejects NaN, infinities and negative values with `InvalidPrice`.
    pub fn from_major(amount: f64, currency: Currency) -> CheckoutResult<Self> {
        if !amount.is_finite() {
            return Err(CheckoutError::InvalidPrice {
                message: format!("amount {} is not finite", amount),
            });
        }
        if amount < 0.0 {
            return Err(CheckoutError::InvalidPrice {
                message: format!("amount {} is negative", amount),
            });
        }
        let scaled = (amount * currency.scale() as f64).round();
        if scaled > i64::MAX as f64 {
            return Err(CheckoutError::InvalidPrice {
                message: format!("amount {} is too large", amount),
            });
        }
        Ok(Self::from_minor(scaled as i64, currency))
    }

    /// Parse an exact decimal string such as `"59.97"` without going through `f64`.
    pub fn parse(input: &str, currency: Currency) -> CheckoutResult<Self> {
        let s = input.trim();
        let invalid = || CheckoutError::InvalidPrice {
            message: format!("cannot parse amount '{}'", input),
        };

        if s.starts_with('-') {
            return Err(CheckoutError::InvalidPrice {
                message: format!("amount '{}' is negative", input),
            });
        }

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let places = currency.decimal_places() as usize;
        if frac.len() > places {
            return Err(CheckoutError::InvalidPrice {
                message: format!("amount '{}' has more than {} decimal places", input, places),
            });
        }

        let whole_units: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac_units: i64 = if places == 0 {
            0
        } else {
            format!("{:0<width$}", frac, width = places)
                .parse()
                .map_err(|_| invalid())?
        };

        whole_units
            .checked_mul(currency.scale())
            .and_then(|v| v.checked_add(frac_units))
            .map(|amount| Self::from_minor(amount, currency))
            .ok_or_else(invalid)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Multiply by a line quantity
    pub fn times(&self, quantity: u32) -> Money {
        Money::from_minor(self.amount.saturating_mul(quantity as i64), self.currency)
    }

    /// Multiply by a line quantity; `None` if the product does not fit
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.amount
            .checked_mul(i64::from(quantity))
            .map(|amount| Money::from_minor(amount, self.currency))
    }

    /// Apply a rate in basis points (800 = 8%), rounding half up to the minor unit
    pub fn percent_bps(&self, bps: u32) -> Money {
        let scaled = self.amount as i128 * bps as i128;
        let rounded = (scaled + 5_000).div_euclid(10_000);
        Money::from_minor(i64::try_from(rounded).unwrap_or(i64::MAX), self.currency)
    }

    /// Add two amounts, rejecting a currency mismatch
    pub fn checked_add(&self, other: Money) -> CheckoutResult<Money> {
        if self.currency != other.currency {
            return Err(CheckoutError::InvalidPrice {
                message: format!("cannot add {} to {}", other.currency, self.currency),
            });
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| CheckoutError::InvalidPrice {
                message: format!("{} + {} overflows", self, other),
            })?;
        Ok(Money::from_minor(amount, self.currency))
    }

    /// Decimal value for wire formats that want a JSON number
    pub fn as_major(&self) -> f64 {
        self.amount as f64 / self.currency.scale() as f64
    }

    /// Exact decimal string without symbol (e.g. "59.97")
    pub fn to_decimal_string(&self) -> String {
        let places = self.currency.decimal_places() as usize;
        if places == 0 {
            return self.amount.to_string();
        }
        let scale = self.currency.scale();
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!(
            "{}{}.{:0width$}",
            sign,
            abs / scale as u64,
            abs % scale as u64,
            width = places
        )
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        format!("{}{}", self.currency.symbol(), self.to_decimal_string())
    }
}

impl Add for Money {
    type Output = Money;

    /// Callers guarantee matching currencies; cart lines are checked on insert.
    fn add(self, rhs: Self) -> Self::Output {
        debug_assert_eq!(self.currency, rhs.currency);
        Money::from_minor(self.amount.saturating_add(rhs.amount), self.currency)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

//! # Cart
//!
//! The shopping cart aggregate. Lines are kept in insertion order with at
//! most one line per product; subtotal and item count are always derived
//! from the line set and never stored.

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::{Currency, Money};
use crate::product::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(Uuid);

impl CartId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CartId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CartId {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CheckoutError::CartNotFound {
                cart_id: s.to_string(),
            })
    }
}

/// One product line in a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,

    /// Product name (denormalized for display and the gateway)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Price captured when the line was last added to
    pub unit_price: Money,

    /// Always >= 1
    pub quantity: u32,
}

impl CartLine {
    /// unit price x quantity
    pub fn total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Derived cart totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub item_count: u32,
}

/// The cart aggregate (single writer; see `CartContext`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub currency: Currency,
    lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart
    pub fn new(currency: Currency) -> Self {
        Self {
            id: CartId::new(),
            currency,
            lines: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Add one unit of a product identified only by id and price
    pub fn add_item(
        &mut self,
        product_id: impl Into<String>,
        unit_price: Money,
    ) -> CheckoutResult<CartTotals> {
        let product_id = product_id.into();
        let name = product_id.clone();
        self.add_named_item(product_id, name, unit_price)
    }

    /// Add one unit of an uncataloged product with a display name
    pub fn add_named_item(
        &mut self,
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
    ) -> CheckoutResult<CartTotals> {
        self.upsert(CartLine {
            product_id: product_id.into(),
            name: name.into(),
            description: None,
            image: None,
            unit_price,
            quantity: 1,
        })
    }

    /// Add one unit of a catalog product at its current price
    pub fn add_product(&mut self, product: &Product) -> CheckoutResult<CartTotals> {
        self.upsert(CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            description: (!product.description.is_empty()).then(|| product.description.clone()),
            image: product.image.clone(),
            unit_price: product.price,
            quantity: 1,
        })
    }

    fn upsert(&mut self, line: CartLine) -> CheckoutResult<CartTotals> {
        self.check_price(&line.unit_price)?;

        let quantity = match self.line(&line.product_id) {
            Some(existing) => {
                existing
                    .quantity
                    .checked_add(1)
                    .ok_or(CheckoutError::InvalidQuantity {
                        quantity: i64::from(existing.quantity) + 1,
                    })?
            }
            None => 1,
        };
        let totals = self
            .totals_with(&line.product_id, line.unit_price, quantity)
            .ok_or(CheckoutError::InvalidQuantity {
                quantity: i64::from(quantity),
            })?;

        match self.lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = quantity;
                // Repeat adds pick up the caller's current price
                existing.unit_price = line.unit_price;
                existing.name = line.name;
                existing.description = line.description;
                existing.image = line.image;
            }
            None => self.lines.push(line),
        }

        self.touch();
        Ok(totals)
    }

    /// Totals with `product_id` at `unit_price` x `quantity`, or `None` if
    /// the subtotal or item count would not fit
    fn totals_with(
        &self,
        product_id: &str,
        unit_price: Money,
        quantity: u32,
    ) -> Option<CartTotals> {
        let others = self
            .lines
            .iter()
            .filter(|l| l.product_id != product_id)
            .map(|l| (l.unit_price, l.quantity));
        sum_lines(self.currency, others.chain(std::iter::once((unit_price, quantity))))
    }

    fn check_price(&self, price: &Money) -> CheckoutResult<()> {
        if price.is_negative() {
            return Err(CheckoutError::InvalidPrice {
                message: format!("unit price {} is negative", price.amount),
            });
        }
        if price.currency != self.currency {
            return Err(CheckoutError::InvalidPrice {
                message: format!(
                    "unit price in {} but cart is in {}",
                    price.currency, self.currency
                ),
            });
        }
        Ok(())
    }

    /// Remove a product's line; absent ids are a no-op
    pub fn remove_item(&mut self, product_id: &str) -> CartTotals {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() != before {
            self.touch();
        }
        self.totals()
    }

    /// Replace a line's quantity; `qty <= 0` removes the line.
    ///
    /// A quantity whose totals would overflow is rejected and the cart is
    /// left as it was.
    pub fn set_quantity(&mut self, product_id: &str, qty: i64) -> CheckoutResult<CartTotals> {
        if qty <= 0 {
            return Ok(self.remove_item(product_id));
        }
        let quantity =
            u32::try_from(qty).map_err(|_| CheckoutError::InvalidQuantity { quantity: qty })?;

        let Some(unit_price) = self.line(product_id).map(|l| l.unit_price) else {
            return Ok(self.totals());
        };
        let totals = self
            .totals_with(product_id, unit_price, quantity)
            .ok_or(CheckoutError::InvalidQuantity { quantity: qty })?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        }
        self.touch();
        Ok(totals)
    }

    /// Empty the cart; calling it on an empty cart changes nothing
    pub fn clear(&mut self) -> CartTotals {
        if !self.lines.is_empty() {
            self.lines.clear();
            self.touch();
        }
        self.totals()
    }

    /// Take a checked-out snapshot's quantities off the live cart.
    ///
    /// Lines added or topped up after the snapshot keep the difference;
    /// lines that drop to zero are removed.
    pub fn remove_purchased(&mut self, purchased: &[CartLine]) -> CartTotals {
        let before = self.lines.clone();
        for bought in purchased {
            if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == bought.product_id) {
                line.quantity = line.quantity.saturating_sub(bought.quantity);
            }
        }
        self.lines.retain(|l| l.quantity > 0);
        if self.lines != before {
            self.touch();
        }
        self.totals()
    }

    /// Subtotal and item count, computed from the current lines
    pub fn totals(&self) -> CartTotals {
        // mutations check their totals first, so only a hand-built cart can miss
        sum_lines(
            self.currency,
            self.lines.iter().map(|l| (l.unit_price, l.quantity)),
        )
        .unwrap_or(CartTotals {
            subtotal: Money::from_minor(i64::MAX, self.currency),
            item_count: u32::MAX,
        })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn sum_lines(
    currency: Currency,
    lines: impl Iterator<Item = (Money, u32)>,
) -> Option<CartTotals> {
    let mut subtotal = Money::zero(currency);
    let mut item_count: u32 = 0;
    for (unit_price, quantity) in lines {
        subtotal = subtotal.checked_add(unit_price.checked_times(quantity)?).ok()?;
        item_count = item_count.checked_add(quantity)?;
    }
    Some(CartTotals {
        subtotal,
        item_count,
    })
}

//! # shop-wasm
//!
//! WebAssembly bindings for the storefront cart.
//!
//! The browser keeps a cart mirror for instant totals and validates the
//! checkout form before it is posted; the server stays authoritative.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCart, validate_buyer, format_price } from 'shop-wasm';
//!
//! await init();
//!
//! const cart = new WasmCart('usd', 800);
//! cart.add_item('1', 'Wireless Headphones', 1999);
//! console.log(cart.breakdown().total);
//!
//! const errors = validate_buyer({ email: 'ada@example.com', firstName: 'Ada' });
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use serde::Serialize;
use shop_core::{
    BuyerInfo, Cart, CartTotals, CheckoutError, Currency, FieldError, Money,
    PriceBreakdown, TaxPolicy,
};
use wasm_bindgen::prelude::*;

fn to_js(err: CheckoutError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn currency_of(code: &str) -> Result<Currency, CheckoutError> {
    Currency::from_code(code)
        .ok_or_else(|| CheckoutError::InvalidRequest(format!("unsupported currency: {}", code)))
}

/// Browser-side cart mirror
#[wasm_bindgen]
pub struct WasmCart {
    cart: Cart,
    tax: TaxPolicy,
}

#[wasm_bindgen]
impl WasmCart {
    #[wasm_bindgen(constructor)]
    pub fn new(currency: &str, tax_rate_bps: u32) -> Result<WasmCart, JsValue> {
        let currency = currency_of(currency).map_err(to_js)?;
        Ok(Self::with_policy(currency, TaxPolicy::new(tax_rate_bps)))
    }

    /// Add one unit; returns the new item count
    pub fn add_item(
        &mut self,
        product_id: &str,
        name: &str,
        price_minor: i64,
    ) -> Result<u32, JsValue> {
        self.try_add(product_id, name, price_minor)
            .map(|t| t.item_count)
            .map_err(to_js)
    }

    /// Zero or negative removes the line; returns the new item count
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> Result<u32, JsValue> {
        self.cart
            .set_quantity(product_id, quantity)
            .map(|t| t.item_count)
            .map_err(to_js)
    }

    pub fn remove_item(&mut self, product_id: &str) -> u32 {
        self.cart.remove_item(product_id).item_count
    }

    pub fn clear(&mut self) {
        self.cart.clear();
    }

    #[wasm_bindgen(getter)]
    pub fn item_count(&self) -> u32 {
        self.cart.totals().item_count
    }

    #[wasm_bindgen(getter)]
    pub fn subtotal_minor(&self) -> i64 {
        self.cart.totals().subtotal.amount
    }

    /// Subtotal, shipping, tax and total as a JS object
    pub fn breakdown(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.price_breakdown())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Cart lines as a JS array
    pub fn lines(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.cart.lines())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Display string for the order total, e.g. "$64.77"
    pub fn display_total(&self) -> String {
        self.price_breakdown().total.display()
    }

    /// Lines as JSON, for local storage
    pub fn to_json(&self) -> String {
        serde_json::to_string(self.cart.lines()).unwrap_or_else(|_| "[]".to_string())
    }
}

impl WasmCart {
    fn with_policy(currency: Currency, tax: TaxPolicy) -> Self {
        Self {
            cart: Cart::new(currency),
            tax,
        }
    }

    fn try_add(
        &mut self,
        product_id: &str,
        name: &str,
        price_minor: i64,
    ) -> Result<CartTotals, CheckoutError> {
        let price = Money::from_minor(price_minor, self.cart.currency);
        self.cart.add_named_item(product_id, name, price)
    }

    fn price_breakdown(&self) -> PriceBreakdown {
        PriceBreakdown::compute(self.cart.totals().subtotal, &self.tax)
    }
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    errors: Vec<FieldError>,
}

fn buyer_errors(buyer: &BuyerInfo) -> Vec<FieldError> {
    match buyer.validate() {
        Ok(()) => Vec::new(),
        Err(e) => e.field_errors().to_vec(),
    }
}

/// Validate the checkout form; returns `{ valid, errors: [{ field, message }] }`
#[wasm_bindgen]
pub fn validate_buyer(buyer: JsValue) -> Result<JsValue, JsValue> {
    let buyer: BuyerInfo = serde_wasm_bindgen::from_value(buyer)
        .map_err(|e| JsValue::from_str(&format!("Invalid checkout form: {}", e)))?;

    let errors = buyer_errors(&buyer);
    let report = ValidationReport {
        valid: errors.is_empty(),
        errors,
    };
    serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Price breakdown for a subtotal, without a cart
#[wasm_bindgen]
pub fn calculate_breakdown(
    subtotal_minor: i64,
    currency: &str,
    tax_rate_bps: u32,
    shipping_minor: i64,
) -> Result<JsValue, JsValue> {
    let currency = currency_of(currency).map_err(to_js)?;
    let breakdown = breakdown_for(subtotal_minor, currency, tax_rate_bps, shipping_minor);
    serde_wasm_bindgen::to_value(&breakdown).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn breakdown_for(
    subtotal_minor: i64,
    currency: Currency,
    tax_rate_bps: u32,
    shipping_minor: i64,
) -> PriceBreakdown {
    let policy = TaxPolicy {
        rate_bps: tax_rate_bps,
        shipping_minor,
    };
    PriceBreakdown::compute(Money::from_minor(subtotal_minor, currency), &policy)
}

/// Format minor units for display; unknown currencies format as USD
#[wasm_bindgen]
pub fn format_price(minor: i64, currency: &str) -> String {
    let currency = Currency::from_code(currency).unwrap_or_default();
    Money::from_minor(minor, currency).display()
}

/// Cheap email shape check for inline form feedback
#[wasm_bindgen]
pub fn validate_email(email: &str) -> bool {
    shop_core::is_valid_email(email.trim())
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> WasmCart {
        WasmCart::with_policy(Currency::USD, TaxPolicy::default())
    }

    #[test]
    fn test_cart_totals() {
        let mut cart = cart();
        cart.try_add("1", "Wireless Headphones", 1999).unwrap();
        cart.try_add("1", "Wireless Headphones", 1999).unwrap();
        cart.try_add("2", "Coffee Mug", 1999).unwrap();

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal_minor(), 5997);
        assert_eq!(cart.display_total(), "$64.77");
    }

    #[test]
    fn test_line_keeps_display_name() {
        let mut cart = cart();
        cart.try_add("1", "Wireless Headphones", 1999).unwrap();
        cart.try_add("1", "Wireless Headphones", 1999).unwrap();

        let line = &cart.cart.lines()[0];
        assert_eq!(line.name, "Wireless Headphones");
        assert_eq!(line.quantity, 2);
        assert!(cart.to_json().contains("Wireless Headphones"));
    }

    #[test]
    fn test_quantity_edits() {
        let mut cart = cart();
        cart.try_add("1", "Headphones", 1999).unwrap();
        cart.try_add("2", "Mug", 850).unwrap();

        assert_eq!(cart.set_quantity("1", 4).unwrap(), 5);
        assert_eq!(cart.set_quantity("2", 0).unwrap(), 4);
        assert_eq!(cart.remove_item("1"), 0);

        cart.try_add("2", "Mug", 850).unwrap();
        cart.clear();
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut cart = cart();
        assert!(matches!(
            cart.try_add("1", "Broken", -1),
            Err(CheckoutError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_breakdown() {
        let b = breakdown_for(5997, Currency::USD, 800, 0);
        assert_eq!(b.tax.amount, 480);
        assert_eq!(b.total.amount, 6477);

        let b = breakdown_for(1000, Currency::USD, 0, 500);
        assert_eq!(b.total.amount, 1500);
    }

    #[test]
    fn test_buyer_errors() {
        let buyer = BuyerInfo {
            email: "ada@example".to_string(),
            first_name: "Ada".to_string(),
            ..BuyerInfo::default()
        };
        let fields: Vec<_> = buyer_errors(&buyer).into_iter().map(|e| e.field).collect();
        assert!(!fields.contains(&"email".to_string()));
        assert!(!fields.contains(&"first_name".to_string()));
        assert!(fields.contains(&"last_name".to_string()));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1999, "usd"), "$19.99");
        assert_eq!(format_price(100, "nope"), "$1.00");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email(" ada@example.com "));
        assert!(!validate_email("ada example.com"));
        assert!(!validate_email("@example.com"));
    }
}

//! # Product Types
//!
//! Read-only catalog types for the storefront.
//! Products are loaded from `config/products.toml`; the core never mutates them.

use crate::money::Money;
use serde::{Deserialize, Serialize};

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Catalog category (e.g. "Electronics")
    pub category: String,

    /// Unit price
    pub price: Money,

    /// Whether the product can currently be added to a cart
    #[serde(default = "default_true")]
    pub in_stock: bool,

    /// Optional image reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create an in-stock product
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: category.into(),
            price,
            in_stock: true,
            image: None,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set image reference
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Builder: mark out of stock
    pub fn out_of_stock(mut self) -> Self {
        self.in_stock = false;
        self
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.add(product);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Products in a category (case-insensitive); `None` or "All" lists everything
    pub fn by_category<'a>(&'a self, category: Option<&'a str>) -> impl Iterator<Item = &'a Product> {
        self.products.iter().filter(move |p| match category {
            None => true,
            Some(c) if c.eq_ignore_ascii_case("all") => true,
            Some(c) => p.category.eq_ignore_ascii_case(c),
        })
    }

    /// Distinct categories in catalog order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for product in &self.products {
            if !seen.contains(&product.category.as_str()) {
                seen.push(&product.category);
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new()
            .with_product(Product::new(
                "1",
                "Wireless Headphones",
                "Electronics",
                Money::from_minor(100, Currency::USD),
            ))
            .with_product(Product::new(
                "3",
                "Running Shoes",
                "Sports",
                Money::from_minor(1000, Currency::USD),
            ))
            .with_product(
                Product::new("4", "Coffee Maker", "Home", Money::from_minor(40, Currency::USD))
                    .out_of_stock(),
            )
    }

    #[test]
    fn test_lookup_and_categories() {
        let catalog = catalog();
        assert_eq!(catalog.get("3").unwrap().name, "Running Shoes");
        assert!(catalog.get("99").is_none());
        assert_eq!(catalog.categories(), vec!["Electronics", "Sports", "Home"]);
        assert_eq!(catalog.by_category(Some("sports")).count(), 1);
        assert_eq!(catalog.by_category(Some("All")).count(), 3);
        assert!(!catalog.get("4").unwrap().in_stock);
    }

    #[test]
    fn test_from_toml() {
        let toml_str = r#"
            [[products]]
            id = "5"
            name = "Backpack"
            category = "Fashion"
            description = "Durable travel backpack"
            image = "/travel-backpack.png"
            price = { amount = 30, currency = "usd" }

            [[products]]
            id = "4"
            name = "Coffee Maker"
            category = "Home"
            in_stock = false
            price = { amount = 40, currency = "usd" }
        "#;

        let catalog = ProductCatalog::from_toml(toml_str).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("5").unwrap().in_stock);
        assert_eq!(catalog.get("5").unwrap().price.amount, 30);
        assert!(!catalog.get("4").unwrap().in_stock);
    }
}

//! Product forms
//!
//! Both forms replace the fields they own with the submitted values; an
//! omitted optional field clears it and an omitted `is_published` reads as
//! unchecked. Fields a form does not own are ignored even when submitted.

use serde::{Deserialize, Serialize};

use super::{check_max_len, optional_text, required, FormErrors};
use crate::models::Product;

/// Maximum length of a product name, in characters
pub const PRODUCT_NAME_MAX_LEN: usize = 150;

/// Raw product fields, as submitted or as shown for editing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFormData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: Option<bool>,
}

impl ProductFormData {
    /// Current values of a stored product
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: Some(product.name.clone()),
            description: product.description.clone(),
            price: Some(product.price),
            category_id: product.category_id,
            is_published: Some(product.is_published),
        }
    }
}

/// A product form: validates raw data, then writes its fields onto a product.
pub trait ProductFormClass: Sized + Send {
    /// Form name reported to clients
    const CLASS: &'static str;
    /// Fields this form edits
    const FIELDS: &'static [&'static str];

    /// Validate `data`. `category_exists` tells whether the submitted
    /// `category_id`, if any, refers to a stored category.
    fn clean(data: &ProductFormData, category_exists: bool) -> Result<Self, FormErrors>;

    /// Write the cleaned fields onto `product`
    fn apply(self, product: &mut Product);
}

fn check_category(data: &ProductFormData, category_exists: bool, errors: &mut FormErrors) {
    if data.category_id.is_some() && !category_exists {
        errors.add(
            "category_id",
            "Select a valid choice. That choice is not one of the available choices.",
        );
    }
}

/// The owner's form: every editable field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub category_id: Option<i64>,
    pub is_published: bool,
}

impl ProductFormClass for ProductForm {
    const CLASS: &'static str = "ProductForm";
    const FIELDS: &'static [&'static str] =
        &["name", "description", "price", "category_id", "is_published"];

    fn clean(data: &ProductFormData, category_exists: bool) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();

        let name = optional_text(&data.name).unwrap_or_default();
        if name.is_empty() {
            required("name", &mut errors);
        } else {
            check_max_len("name", &name, PRODUCT_NAME_MAX_LEN, &mut errors);
        }

        let price = match data.price {
            None => {
                required("price", &mut errors);
                0
            }
            Some(price) if price < 0 => {
                errors.add("price", "Ensure this value is greater than or equal to 0.");
                price
            }
            Some(price) => price,
        };

        check_category(data, category_exists, &mut errors);

        errors.into_result(Self {
            name,
            description: optional_text(&data.description),
            price,
            category_id: data.category_id,
            is_published: data.is_published.unwrap_or(false),
        })
    }

    fn apply(self, product: &mut Product) {
        product.name = self.name;
        product.description = self.description;
        product.price = self.price;
        product.category_id = self.category_id;
        product.is_published = self.is_published;
    }
}

/// The moderator's form: publication flag, description and category only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductModeratorForm {
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub is_published: bool,
}

impl ProductFormClass for ProductModeratorForm {
    const CLASS: &'static str = "ProductModeratorForm";
    const FIELDS: &'static [&'static str] = &["is_published", "description", "category_id"];

    fn clean(data: &ProductFormData, category_exists: bool) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        check_category(data, category_exists, &mut errors);

        errors.into_result(Self {
            description: optional_text(&data.description),
            category_id: data.category_id,
            is_published: data.is_published.unwrap_or(false),
        })
    }

    fn apply(self, product: &mut Product) {
        product.description = self.description;
        product.category_id = self.category_id;
        product.is_published = self.is_published;
    }
}

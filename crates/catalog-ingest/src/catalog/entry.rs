//! Catalog entries built from product rows
//!
//! Column names are matched case-insensitively. Fields that are absent or
//! unparseable are left out of the request body entirely.

use catalog_common::row::ProductRow;
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled Product";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockStatus {
    #[serde(rename = "instock")]
    InStock,
    #[serde(rename = "outofstock")]
    OutOfStock,
    #[serde(rename = "onbackorder")]
    OnBackorder,
}

impl StockStatus {
    /// Map free text such as "In stock", "sold out" or "1"
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "instock" | "in stock" | "available" | "yes" | "1" | "true" => Some(Self::InStock),
            "outofstock" | "out of stock" | "soldout" | "no" | "0" | "false" => Some(Self::OutOfStock),
            "onbackorder" | "backorder" => Some(Self::OnBackorder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backorders {
    No,
    Notify,
    Yes,
}

impl Backorders {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "no" | "none" | "false" | "0" => Some(Self::No),
            "notify" | "warn" => Some(Self::Notify),
            "yes" | "allow" | "1" | "true" => Some(Self::Yes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub length: String,
    pub width: String,
    pub height: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdRef {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Set for global (`pa_`) attributes instead of `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub visible: bool,
    pub variation: bool,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

/// Request body for creating or replacing a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub status: String,
    pub description: String,
    pub short_description: String,
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_class: Option<String>,
    pub manage_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<StockStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backorders: Option<Backorders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_class: Option<String>,
    pub categories: Vec<IdRef>,
    pub tags: Vec<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
    pub attributes: Vec<Attribute>,
    pub meta_data: Vec<MetaEntry>,

    /// Names still to be resolved into `categories`
    #[serde(skip)]
    pub category_names: Vec<String>,
    /// Names still to be resolved into `tags`
    #[serde(skip)]
    pub tag_names: Vec<String>,
    /// Source row number, for logs
    #[serde(skip)]
    pub row: usize,
}

impl CatalogEntry {
    /// Build an entry from a row; taxonomy names are resolved later
    pub fn from_row(row: &ProductRow, status: &str) -> Self {
        let text = |column: &str| row.get_ci(column).map(str::trim).unwrap_or_default();
        let optional = |column: &str| Some(text(column)).filter(|v| !v.is_empty()).map(str::to_string);

        let name = [text("Name"), text("Title")]
            .into_iter()
            .find(|v| !v.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        let regular = Some(text("Regular price"))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| text("Price"));

        let dimensions = {
            let (length, width, height) = (text("Length"), text("Width"), text("Height"));
            if length.is_empty() && width.is_empty() && height.is_empty() {
                None
            } else {
                Some(Dimensions {
                    length: length.to_string(),
                    width: width.to_string(),
                    height: height.to_string(),
                })
            }
        };

        let images = split_list(text("Images"));

        Self {
            slug: make_slug(&name),
            name,
            product_type: "simple".to_string(),
            status: status.to_string(),
            description: row.get_ci("Description").unwrap_or_default().to_string(),
            short_description: row.get_ci("Short description").unwrap_or_default().to_string(),
            sku: text("SKU").to_string(),
            regular_price: money(regular),
            sale_price: money(text("Sale price")),
            tax_status: optional("Tax status").map(|s| s.to_lowercase()),
            tax_class: optional("Tax class"),
            manage_stock: matches!(text("Manage stock").to_lowercase().as_str(), "true" | "yes" | "1"),
            stock_quantity: text("Stock quantity").parse().ok(),
            stock_status: StockStatus::parse(text("Stock status")),
            backorders: Backorders::parse(text("Backorders")),
            weight: optional("Weight"),
            dimensions,
            shipping_class: optional("Shipping class"),
            categories: Vec::new(),
            tags: Vec::new(),
            images: (!images.is_empty())
                .then(|| images.into_iter().map(|src| ImageRef { src }).collect()),
            attributes: parse_attributes(row),
            meta_data: parse_meta(row),
            category_names: split_list(text("Categories")),
            tag_names: split_list(text("Tags")),
            row: row.number,
        }
    }
}

/// Comma-separated list, trimmed, empties dropped
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a money string: "$1,299.00" -> "1299.00", "12,5" -> "12.5"
pub fn money(value: &str) -> Option<String> {
    let kept: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if kept.is_empty() {
        return None;
    }

    let fixed = if kept.contains(',') && !kept.contains('.') {
        kept.replacen(',', ".", 1)
    } else {
        kept.replace(',', "")
    };

    is_decimal(&fixed).then_some(fixed)
}

/// `-?\d+(\.\d+)?`
fn is_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    digits(int) && frac.is_none_or(digits)
}

/// ASCII-folded, dash-separated slug with a random 5-character suffix
pub fn make_slug(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut base = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c);
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    let base = base.trim_end_matches('-');

    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(5).collect();
    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base, suffix)
    }
}

fn parse_attributes(row: &ProductRow) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    for (column, value) in row.fields() {
        let lower = column.trim().to_lowercase();
        let trimmed = column.trim();
        let (name, slug) = if lower.starts_with("attr:") {
            (Some(trimmed["attr:".len()..].trim().to_string()), None)
        } else if lower.starts_with("attribute_") {
            (Some(trimmed["attribute_".len()..].trim().to_string()), None)
        } else if lower.starts_with("pa_") {
            (None, Some(lower.clone()))
        } else {
            continue;
        };

        let options = split_list(value);
        if options.is_empty() {
            continue;
        }
        attributes.push(Attribute {
            name,
            slug,
            visible: true,
            variation: false,
            options,
        });
    }
    attributes
}

fn parse_meta(row: &ProductRow) -> Vec<MetaEntry> {
    row.fields()
        .filter_map(|(column, value)| {
            let trimmed = column.trim();
            trimmed
                .to_lowercase()
                .starts_with("meta:")
                .then(|| MetaEntry {
                    key: trimmed["meta:".len()..].to_string(),
                    value: value.to_string(),
                })
        })
        .collect()
}

//! Request/response DTOs for the commerce platform's product resource.

use serde::{Deserialize, Serialize};
use vitrine_core::traits::ListingPayload;

/// Metafield types the platform accepts.
const ALLOWED_METAFIELD_TYPES: &[&str] = &[
    "single_line_text_field",
    "multi_line_text_field",
    "url",
];

#[derive(Debug, Serialize)]
pub struct ProductEnvelope {
    pub product: ProductBody,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub title: String,
    pub body_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    pub handle: String,
    /// Comma-joined, the platform's wire format for tags.
    pub tags: String,
    pub variants: Vec<VariantBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metafields: Vec<MetafieldBody>,
}

#[derive(Debug, Serialize)]
pub struct VariantBody {
    /// Decimal string, two places.
    pub price: String,
    pub inventory_quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageBody {
    pub src: String,
}

#[derive(Debug, Serialize)]
pub struct ImageEnvelope {
    pub image: ImageBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetafieldBody {
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: String,
}

impl ProductBody {
    /// Build the wire payload from a listing. `include_images` is false on
    /// updates — images are reconciled separately.
    pub fn from_listing(listing: &ListingPayload, include_images: bool) -> Self {
        Self {
            title: listing.title.clone(),
            body_html: listing.body_html.clone(),
            vendor: listing.vendor.clone(),
            product_type: listing.product_type.clone(),
            handle: listing.handle.clone(),
            tags: listing.tags.join(", "),
            variants: vec![VariantBody {
                price: format_price(listing.price),
                inventory_quantity: listing.quantity,
            }],
            images: if include_images {
                listing
                    .image_urls
                    .iter()
                    .map(|src| ImageBody { src: src.clone() })
                    .collect()
            } else {
                Vec::new()
            },
            metafields: metafields_from_value(&listing.metafields),
        }
    }
}

/// Decimal price string with two places, the platform's wire format.
pub fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

/// Convert the stored metafield object into wire metafields. Entries with
/// missing fields are skipped; undeclared types fall back to single-line
/// text.
pub fn metafields_from_value(value: &serde_json::Value) -> Vec<MetafieldBody> {
    let Some(object) = value.as_object() else {
        return Vec::new();
    };
    object
        .values()
        .filter_map(|entry| {
            let namespace = entry.get("namespace")?.as_str()?;
            let key = entry.get("key")?.as_str()?;
            let value = entry.get("value")?.as_str()?;
            let declared = entry.get("type").and_then(|t| t.as_str()).unwrap_or("");
            let value_type = if ALLOWED_METAFIELD_TYPES.contains(&declared) {
                declared
            } else {
                "single_line_text_field"
            };
            Some(MetafieldBody {
                namespace: namespace.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                value_type: value_type.to_string(),
            })
        })
        .collect()
}

// ---- Response types ----

#[derive(Debug, Deserialize)]
pub struct ProductResponseEnvelope {
    pub product: RemoteProductBody,
}

#[derive(Debug, Deserialize)]
pub struct ProductsResponseEnvelope {
    pub products: Vec<RemoteProductBody>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteProductBody {
    pub id: i64,
    pub handle: String,
    #[serde(default)]
    pub images: Vec<RemoteImage>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteImage {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ImagesResponseEnvelope {
    pub images: Vec<RemoteImage>,
}

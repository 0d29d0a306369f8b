//! Object key naming for order files.
//!
//! Keys are laid out as
//! `orders/<year>/<month>/order-<order_id>/<unix_millis>-<sanitized_filename>`
//! so listings stay bounded per month and per order.

use std::fmt::Display;

use chrono::{DateTime, Datelike, Utc};

/// Generate the object key for an order file using the current time.
#[must_use]
pub fn order_file_key(order_id: impl Display, original_filename: &str) -> String {
    order_file_key_at(order_id, original_filename, Utc::now())
}

/// Generate the object key for an order file at a given instant.
#[must_use]
pub fn order_file_key_at(
    order_id: impl Display,
    original_filename: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "orders/{}/{:02}/order-{}/{}-{}",
        at.year(),
        at.month(),
        order_id,
        at.timestamp_millis(),
        sanitize_filename(original_filename)
    )
}

/// Last path segment of a key or path.
#[must_use]
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Sanitize filename for storage keys and local paths.
///
/// Only ASCII alphanumerics, dots and hyphens survive; everything else,
/// including path separators, becomes `_`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

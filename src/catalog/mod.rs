//! Product image lookup.
//!
//! Orders must always carry a displayable image per line item. When the
//! storefront did not capture one, the path is derived from the product name
//! and the chosen color.

/// Image used when nothing more specific matches.
pub const DEFAULT_PRODUCT_IMAGE: &str = "/images/products/default.jpg";

/// Resolve an image path for a product from its name and color.
///
/// The result is deterministic and never empty.
pub fn resolve_product_image(product_name: &str, color: &str) -> String {
    let name: String = product_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let name = name.trim();
    let color = color.trim().to_lowercase();

    if name.contains("sofa") || name.contains("corner") || name.contains("suite") {
        let subfolder = if name.contains("corner") { "corner" } else { "v3+2" };
        format!(
            "/images/Verona Sofa/{}/v{}3.jpg",
            subfolder,
            upholstery_color(&color)
        )
    } else if name.contains("chair") {
        format!("/images/Arm Chair/v/v{}.jpg", upholstery_color(&color))
    } else if name.contains("ottoman") || name.contains("footstool") {
        format!("/images/ottoman-{}.jpg", color_or_grey(&color))
    } else if name.contains("bed") || name.contains("divan") {
        format!("/images/bed-{}.jpg", color_or_grey(&color))
    } else {
        DEFAULT_PRODUCT_IMAGE.to_string()
    }
}

/// Map a free-form color onto one of the photographed upholstery colors.
fn upholstery_color(color: &str) -> &'static str {
    match color {
        "black" => "black",
        "cream" | "beige" => "cream",
        "blue" => "blue",
        "brown" => "brown",
        _ => "grey",
    }
}

fn color_or_grey(color: &str) -> &str {
    if color.is_empty() {
        "grey"
    } else {
        color
    }
}

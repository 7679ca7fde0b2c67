use crate::models::GenerationRequest;

pub const SYSTEM_INSTRUCTION: &str = include_str!("../data/prompts/system_instruction.txt");
pub const USER_FIELDS: &str = include_str!("../data/prompts/user_fields.txt");
pub const PAYMENT_SIMULATOR: &str = include_str!("../data/prompts/payment_simulator.txt");

/// Replace `{{key}}` placeholders in a template string.
///
/// Single pass over the template: substituted values are never scanned again, and
/// unknown placeholders are kept verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };
        let key = &after[..end];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    result.push_str(rest);
    result
}

/// The field listing sent alongside the product photo.
pub fn user_fields(request: &GenerationRequest) -> String {
    let opt = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
    render(
        USER_FIELDS,
        &[
            ("product_name", request.product_name.trim()),
            ("product_description", request.product_description.trim()),
            ("display_style", request.display_style.as_str()),
            ("content_type", request.content_type.as_str()),
            ("price_info", &opt(&request.price_info)),
            ("promo_info", &opt(&request.promo_info)),
            ("feature_1", request.feature(0).trim()),
            ("feature_2", request.feature(1).trim()),
            ("feature_3", request.feature(2).trim()),
            ("seasonal_theme", &opt(&request.seasonal_theme)),
        ],
    )
}

/// Text of the simulated checkout dialog.
pub fn payment_simulator(product_label: &str, amount: i64, notice: Option<&str>) -> String {
    let notice = notice.map(|n| format!("{n}\n")).unwrap_or_default();
    render(
        PAYMENT_SIMULATOR,
        &[
            ("product_label", product_label),
            ("amount", &format_rupiah(amount)),
            ("notice", &notice),
        ],
    )
}

/// `7500` -> `7.500` (id-ID grouping).
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

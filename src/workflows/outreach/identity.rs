use super::domain::{CustomerKey, IdentitySource, OrderRecord};

/// Collapses a phone number to its canonical digit string.
///
/// Formatting characters are dropped and a mainland `+86`/`0086` country
/// prefix on an 11-digit mobile number is removed, so `+86 138-0000-0000`
/// and `13800000000` compare equal.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let canonical = if digits.len() == 15 && digits.starts_with("0086") {
        &digits[4..]
    } else if digits.len() == 13 && digits.starts_with("86") {
        &digits[2..]
    } else {
        digits.as_str()
    };

    if canonical.is_empty() {
        None
    } else {
        Some(canonical.to_string())
    }
}

pub(crate) fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

/// Derives the grouping key: phone, then name+address, then name, then address.
pub fn identity_key(order: &OrderRecord) -> Option<(CustomerKey, IdentitySource)> {
    if let Some(phone) = order.phone.as_deref().and_then(normalize_phone) {
        return Some((CustomerKey(phone), IdentitySource::Phone));
    }

    let name = clean_text(order.name.as_deref());
    let address = clean_text(order.address.as_deref());
    match (name, address) {
        (Some(name), Some(address)) => Some((
            CustomerKey(format!("{name}|{address}")),
            IdentitySource::NameAndAddress,
        )),
        (Some(name), None) => Some((CustomerKey(name), IdentitySource::Name)),
        (None, Some(address)) => Some((CustomerKey(address), IdentitySource::Address)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order(phone: Option<&str>, name: Option<&str>, address: Option<&str>) -> OrderRecord {
        OrderRecord {
            phone: phone.map(str::to_string),
            name: name.map(str::to_string),
            address: address.map(str::to_string),
            order_date: NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"),
            gross_revenue: 100.0,
            payment_amount: None,
            refund_amount: 0.0,
            refund_type: None,
            refund_status: None,
            order_status: None,
            platform: None,
            category: None,
            item_name: None,
            tracking_number: None,
        }
    }

    #[test]
    fn phone_formats_collapse_to_same_digits() {
        assert_eq!(normalize_phone("138-0000-0000").as_deref(), Some("13800000000"));
        assert_eq!(normalize_phone("+86 138 0000 0000").as_deref(), Some("13800000000"));
        assert_eq!(normalize_phone("0086-13800000000").as_deref(), Some("13800000000"));
        assert_eq!(normalize_phone("n/a"), None);
    }

    #[test]
    fn key_falls_back_through_identity_chain() {
        let (key, source) = identity_key(&order(Some("138 0000 0000"), Some("Li"), None))
            .expect("phone key");
        assert_eq!(key.0, "13800000000");
        assert_eq!(source, IdentitySource::Phone);

        let (key, source) =
            identity_key(&order(Some("--"), Some(" Li  Wei "), Some("Road 1"))).expect("key");
        assert_eq!(key.0, "Li Wei|Road 1");
        assert_eq!(source, IdentitySource::NameAndAddress);

        let (_, source) = identity_key(&order(None, Some("Li"), None)).expect("name key");
        assert_eq!(source, IdentitySource::Name);

        let (_, source) = identity_key(&order(None, None, Some("Road 1"))).expect("address key");
        assert_eq!(source, IdentitySource::Address);

        assert!(identity_key(&order(None, Some("  "), None)).is_none());
    }
}

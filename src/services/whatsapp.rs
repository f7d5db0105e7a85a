use crate::config::AppConfig;

/// Digits-only WhatsApp phone, suitable for a `wa.me` link.
pub fn normalize_whatsapp_phone(value: &str) -> Option<String> {
    let digits = value
        .chars()
        .filter(|character| character.is_ascii_digit())
        .collect::<String>();
    if digits.is_empty() {
        return None;
    }
    Some(digits)
}

/// Build the deep link that opens a chat composer pre-filled with `text`.
/// Returns `None` when no company WhatsApp number is configured.
pub fn share_link(config: &AppConfig, text: &str) -> Option<String> {
    let phone = config
        .whatsapp_phone_e164
        .as_deref()
        .and_then(normalize_whatsapp_phone)?;

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("text", text)
        .finish();
    Some(format!("https://wa.me/{phone}?{query}"))
}

#[cfg(test)]
mod tests {
    use super::{normalize_whatsapp_phone, share_link};
    use crate::config::AppConfig;

    #[test]
    fn normalizes_phone_to_digits() {
        assert_eq!(
            normalize_whatsapp_phone("+20 101 337 3634"),
            Some("201013373634".to_string())
        );
        assert_eq!(normalize_whatsapp_phone("n/a"), None);
    }

    #[test]
    fn share_link_urlencodes_the_invoice_text() {
        let mut config = AppConfig::from_env();
        config.whatsapp_phone_e164 = Some("+201013373634".to_string());

        let link = share_link(&config, "Booking confirmed!\n#CM-1 & done").unwrap();
        assert!(link.starts_with("https://wa.me/201013373634?text="));
        assert!(!link.contains(' '));
        assert!(!link.contains('\n'));
        assert!(link.contains("%26"), "ampersand must be encoded: {link}");

        config.whatsapp_phone_e164 = None;
        assert!(share_link(&config, "hello").is_none());
    }
}

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// Normalizes a caller-supplied recipient into WhatsApp JID form, matching
/// the bridge's own `<digits>@s.whatsapp.net` convention.
pub fn normalize_jid(recipient: &str) -> String {
    if recipient.ends_with("@s.whatsapp.net") || recipient.contains('@') {
        return recipient.to_string();
    }
    let digits: String = recipient.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits}@s.whatsapp.net")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_digits() {
        assert_eq!(normalize_jid("+1 555-123-4567"), "15551234567@s.whatsapp.net");
    }

    #[test]
    fn leaves_jid_form_alone() {
        assert_eq!(normalize_jid("15551234567@s.whatsapp.net"), "15551234567@s.whatsapp.net");
    }
}

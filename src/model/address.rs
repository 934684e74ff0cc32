//! Sender addresses.

/// A parsed email address.
///
/// # Examples
/// - `"Acme Billing <billing@acme.com>"` → `display_name = "Acme Billing"`, `address = "billing@acme.com"`
/// - `"billing@acme.com"` → `display_name = ""`, `address = "billing@acme.com"`
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Build an address from its two parts, trimming both.
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into().trim().to_string(),
            address: address.into().trim().to_string(),
        }
    }

    /// Parse a single address from a header value.
    ///
    /// Accepts `user@domain`, `<user@domain>`, `Name <user@domain>` and
    /// `"Quoted, Name" <user@domain>`. Anything else is kept verbatim as the
    /// address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    display_name: strip_quotes(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }
        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }

    /// Short label identifying the sender, used in archive file names.
    ///
    /// Prefers the display name; otherwise derives a company-like label from
    /// the domain (`billing@acme.co.uk` → `Acme`). Falls back to `"unknown"`.
    pub fn label(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }
        match self.address.split_once('@') {
            Some((_, domain)) if !domain.is_empty() => {
                let company = domain.split('.').next().unwrap_or(domain);
                let mut chars = company.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => "unknown".to_string(),
                }
            }
            _ if !self.address.is_empty() => self.address.clone(),
            _ => "unknown".to_string(),
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("Acme Billing <billing@acme.com>");
        assert_eq!(addr.address, "billing@acme.com");
        assert_eq!(addr.display_name, "Acme Billing");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Doe, Jane\" <jane@example.com>");
        assert_eq!(addr.display_name, "Doe, Jane");
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("  user@example.com ");
        assert_eq!(addr.address, "user@example.com");
        assert!(addr.display_name.is_empty());
    }

    #[test]
    fn test_label_prefers_display_name() {
        let addr = EmailAddress::new("Acme Billing", "billing@acme.com");
        assert_eq!(addr.label(), "Acme Billing");
    }

    #[test]
    fn test_label_from_domain() {
        let addr = EmailAddress::new("", "billing@acme.co.uk");
        assert_eq!(addr.label(), "Acme");
    }

    #[test]
    fn test_label_empty() {
        assert_eq!(EmailAddress::default().label(), "unknown");
    }

    #[test]
    fn test_display() {
        let addr = EmailAddress::new("Alice", "alice@example.com");
        assert_eq!(addr.display(), "Alice <alice@example.com>");
        assert_eq!(addr.to_string(), "Alice <alice@example.com>");
    }
}

//! Sender address splitting (RFC 5322 §3.4), used to derive a greeting name.

/// A sender split into display name and bare address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`), or the raw value if no address was found.
    pub address: String,
}

impl Sender {
    /// Split an already-decoded `From` value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    pub fn parse(decoded: &str) -> Self {
        let trimmed = decoded.trim();

        if let (Some(angle_start), Some(angle_end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if angle_end > angle_start {
                return Self {
                    display_name: strip_quotes(&trimmed[..angle_start]),
                    address: trimmed[angle_start + 1..angle_end].trim().to_string(),
                };
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Name to greet the sender with: the display name, else the address.
    pub fn greeting_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.address
        } else {
            &self.display_name
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

use std::fmt;

/// Element lookup strategy plus its selector, parsed from a locator string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    XPath(String),
    AccessibilityId(String),
    ResourceId(String),
}

impl Locator {
    /// `/…` or `(…` is XPath, `~…` is an accessibility id, anything containing `:id/` is a
    /// resource id. Everything else is treated as XPath.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with('/') || raw.starts_with('(') {
            Locator::XPath(raw.to_string())
        } else if let Some(id) = raw.strip_prefix('~') {
            Locator::AccessibilityId(id.trim().to_string())
        } else if raw.contains(":id/") {
            Locator::ResourceId(raw.to_string())
        } else {
            Locator::XPath(raw.to_string())
        }
    }

    /// Any element whose text contains `needle`.
    pub fn text_contains(needle: &str) -> Self {
        Locator::XPath(format!("//*[contains(@text,{})]", xpath_literal(needle)))
    }

    /// W3C `using` value.
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::XPath(_) => "xpath",
            Locator::AccessibilityId(_) => "accessibility id",
            Locator::ResourceId(_) => "id",
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Locator::XPath(s) | Locator::AccessibilityId(s) | Locator::ResourceId(s) => s,
        }
    }
}

/// XPath 1.0 string literal for `s`. XPath has no escapes, so text holding both quote
/// kinds is spliced together with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::AccessibilityId(id) => write!(f, "~{id}"),
            other => f.write_str(other.selector()),
        }
    }
}

/// Extract just the ASCII digits of a string
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a phone number for storage
/// Handles various input formats and normalizes to (XXX) XXX-XXXX
pub fn format_phone(phone: &str) -> String {
    let digits = digits_only(phone);

    match digits.len() {
        10 => format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..10]
        ),
        11 if digits.starts_with('1') => format!(
            "({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..11]
        ),
        _ => phone.trim().to_string(), // Return original if can't format
    }
}

/// Case-insensitive substring test
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Convert a camelCase or PascalCase key to snake_case.
/// Keys that are already snake_case come back unchanged.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone("15551234567"), "(555) 123-4567");
        assert_eq!(format_phone("555-123-4567"), "(555) 123-4567");
        assert_eq!(format_phone("(555) 123-4567"), "(555) 123-4567");
        assert_eq!(format_phone("123"), "123"); // Too short, return as-is
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("photoRelease"), "photo_release");
        assert_eq!(camel_to_snake("preferredScriptureTranslation"), "preferred_scripture_translation");
        assert_eq!(camel_to_snake("EmergencyContact"), "emergency_contact");
        assert_eq!(camel_to_snake("address_line1"), "address_line1");
        assert_eq!(camel_to_snake("addressLine1"), "address_line1");
        assert_eq!(camel_to_snake("dob"), "dob");
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Smith Household", "smith"));
        assert!(contains_ignore_case("O'Brien", "BRIEN"));
        assert!(!contains_ignore_case("Jones", "smith"));
    }
}

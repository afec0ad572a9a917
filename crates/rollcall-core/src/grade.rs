//! Grade normalization.
//!
//! Children's grades arrive as free text ("Kindergarten", "4th Grade", "grade 7",
//! "Senior"). Division placement needs an integer code in `0..=12` where 0 is
//! kindergarten. Anything that cannot be read as one of those is unknown.

/// Highest grade code (12th grade).
pub const MAX_GRADE: u8 = 12;

/// Filler words that may surround the grade itself.
const FILLER_WORDS: &[&str] = &["grade", "gr", "grd"];

/// Normalize a free-text grade into a code in `0..=12`.
/// Returns `None` for anything unrecognized, including pre-kindergarten.
pub fn grade_code(text: &str) -> Option<u8> {
    let lower = text.trim().to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty() && !FILLER_WORDS.contains(t))
        .collect();

    match tokens.as_slice() {
        [token] => parse_token(token),
        _ => None,
    }
}

fn parse_token(token: &str) -> Option<u8> {
    if let Some(code) = parse_numeric(token) {
        return (code <= MAX_GRADE).then_some(code);
    }

    let code = match token {
        "k" | "kg" | "kinder" | "kindergarten" | "kindergarden" => 0,
        "first" | "one" => 1,
        "second" | "two" => 2,
        "third" | "three" => 3,
        "fourth" | "four" => 4,
        "fifth" | "five" => 5,
        "sixth" | "six" => 6,
        "seventh" | "seven" => 7,
        "eighth" | "eight" => 8,
        "ninth" | "nine" | "freshman" => 9,
        "tenth" | "ten" | "sophomore" => 10,
        "eleventh" | "eleven" | "junior" => 11,
        "twelfth" | "twelve" | "senior" => 12,
        _ => return None,
    };
    Some(code)
}

/// Parse "4", "4th", "1st", "22nd" style tokens.
fn parse_numeric(token: &str) -> Option<u8> {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return None;
    }
    let (digits, suffix) = token.split_at(digits_end);
    if !matches!(suffix, "" | "st" | "nd" | "rd" | "th") {
        return None;
    }
    digits.parse::<u8>().ok()
}

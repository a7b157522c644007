use crate::err::IntLiteralError;

/// Parses an unsigned integer literal as written in a format file.
///
/// Accepted forms:
/// - decimal: `42`
/// - hex: `0x2a`, `0X2A`
/// - octal: `0o52` or a leading zero, `052`
/// - binary: `0b101010`
///
/// `_` may separate two digits. Signs and expressions are rejected.
pub fn parse_int_literal(literal: &str) -> Result<u64, IntLiteralError> {
    if literal.is_empty() {
        return Err(IntLiteralError::Empty);
    }

    let lower = literal.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match lower.as_deref() {
        Some("0x") => (16, &literal[2..]),
        Some("0o") => (8, &literal[2..]),
        Some("0b") => (2, &literal[2..]),
        _ if literal.len() > 1 && literal.starts_with('0') => (8, &literal[1..]),
        _ => (10, literal),
    };

    if digits.is_empty() {
        return Err(IntLiteralError::Empty);
    }

    let mut value: u64 = 0;
    let mut prev_was_digit = false;

    for (i, c) in digits.char_indices() {
        if c == '_' {
            let next_is_digit = digits[i + 1..]
                .chars()
                .next()
                .is_some_and(|n| n.is_digit(radix));
            if !prev_was_digit || !next_is_digit {
                return Err(invalid_digit(literal, c, radix));
            }
            prev_was_digit = false;
            continue;
        }

        let digit = c.to_digit(radix).ok_or_else(|| invalid_digit(literal, c, radix))?;
        value = value
            .checked_mul(u64::from(radix))
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| IntLiteralError::Overflow {
                literal: literal.to_owned(),
            })?;
        prev_was_digit = true;
    }

    Ok(value)
}

fn invalid_digit(literal: &str, found: char, radix: u32) -> IntLiteralError {
    IntLiteralError::InvalidDigit {
        literal: literal.to_owned(),
        found,
        radix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_all_radixes() {
        assert_eq!(parse_int_literal("0"), Ok(0));
        assert_eq!(parse_int_literal("42"), Ok(42));
        assert_eq!(parse_int_literal("0x2a"), Ok(42));
        assert_eq!(parse_int_literal("0X2A"), Ok(42));
        assert_eq!(parse_int_literal("0o52"), Ok(42));
        assert_eq!(parse_int_literal("052"), Ok(42));
        assert_eq!(parse_int_literal("0b101010"), Ok(42));
        assert_eq!(parse_int_literal("0x0000_0001"), Ok(1));
        assert_eq!(parse_int_literal("1_000"), Ok(1000));
    }

    #[test]
    fn test_rejects_expressions_and_signs() {
        assert_eq!(
            parse_int_literal("not-a-number"),
            Err(IntLiteralError::InvalidDigit {
                literal: "not-a-number".to_owned(),
                found: 'n',
                radix: 10,
            })
        );
        assert!(parse_int_literal("-1").is_err());
        assert!(parse_int_literal("+1").is_err());
        assert!(parse_int_literal("1+1").is_err());
        assert!(parse_int_literal("089").is_err());
    }

    #[test]
    fn test_rejects_empty_digits() {
        assert_eq!(parse_int_literal(""), Err(IntLiteralError::Empty));
        assert_eq!(parse_int_literal("0x"), Err(IntLiteralError::Empty));
    }

    #[test]
    fn test_rejects_misplaced_separators() {
        assert!(parse_int_literal("_1").is_err());
        assert!(parse_int_literal("1_").is_err());
        assert!(parse_int_literal("1__0").is_err());
    }

    #[test]
    fn test_overflow() {
        assert_eq!(parse_int_literal("0xffffffffffffffff"), Ok(u64::MAX));
        assert_eq!(
            parse_int_literal("0x10000000000000000"),
            Err(IntLiteralError::Overflow {
                literal: "0x10000000000000000".to_owned()
            })
        );
    }
}

//! The default number parser.
//!
//! Accepts an optional `-` or `+` sign followed by decimal digits, `0x` hex
//! digits or `0b` binary digits. Decimal literals must fit in a [`Cell`];
//! hex and binary literals may use the whole 32 bit pattern, so `0xffffffff`
//! is `-1`.

use crate::{word::Cell, Error};

pub fn parse(token: &str) -> Result<Cell, Error> {
    let (neg, body) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    if let Some(digits) = strip_radix(body, 'x') {
        let raw = digits_in(digits, 16)?;
        return Ok(apply_sign(neg, raw as Cell));
    }
    if let Some(digits) = strip_radix(body, 'b') {
        let raw = digits_in(digits, 2)?;
        return Ok(apply_sign(neg, raw as Cell));
    }

    let mag = digits_in(body, 10)?;
    let limit = if neg { 1u32 << 31 } else { Cell::MAX as u32 };
    if mag > limit {
        return Err(Error::NotAWord);
    }
    Ok(apply_sign(neg, mag as Cell))
}

fn strip_radix(body: &str, marker: char) -> Option<&str> {
    let mut chars = body.chars();
    match (chars.next(), chars.next()) {
        (Some('0'), Some(m)) if m.to_ascii_lowercase() == marker => Some(chars.as_str()),
        _ => None,
    }
}

fn digits_in(digits: &str, radix: u32) -> Result<u32, Error> {
    // `from_str_radix` would also accept a second sign
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(Error::NotAWord);
    }
    u32::from_str_radix(digits, radix).map_err(|_| Error::NotAWord)
}

#[inline]
fn apply_sign(neg: bool, val: Cell) -> Cell {
    if neg {
        val.wrapping_neg()
    } else {
        val
    }
}

#[cfg(test)]
pub mod test {
    use super::parse;
    use crate::Error;

    #[test]
    fn decimal() {
        assert_eq!(parse("0"), Ok(0));
        assert_eq!(parse("42"), Ok(42));
        assert_eq!(parse("-7"), Ok(-7));
        assert_eq!(parse("+5"), Ok(5));
        assert_eq!(parse("2147483647"), Ok(i32::MAX));
        assert_eq!(parse("-2147483648"), Ok(i32::MIN));
        assert_eq!(parse("2147483648"), Err(Error::NotAWord));
    }

    #[test]
    fn prefixed() {
        assert_eq!(parse("0x10"), Ok(16));
        assert_eq!(parse("0XfF"), Ok(255));
        assert_eq!(parse("0xffffffff"), Ok(-1));
        assert_eq!(parse("-0x10"), Ok(-16));
        assert_eq!(parse("0b101"), Ok(5));
        assert_eq!(parse("0x100000000"), Err(Error::NotAWord));
        assert_eq!(parse("0b102"), Err(Error::NotAWord));
    }

    #[test]
    fn not_numbers() {
        for tok in [
            "", "-", "+", "0x", "0b", "foo", "1+", "--1", "-+1", "0x-1", "1.5",
        ] {
            assert_eq!(parse(tok), Err(Error::NotAWord), "{tok:?}");
        }
    }
}

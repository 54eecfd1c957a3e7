//! Tokenizer for scaling expressions
use eyre::bail;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    /// Big-endian byte string from a `0x`/`0b` literal
    Bytes(Vec<u8>),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Amp,
    LParen,
    RParen,
}

pub(crate) fn tokenize(src: &str) -> eyre::Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '&' => {
                chars.next();
                tokens.push(Token::Amp);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(number(&src[start..end])?);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(src[start..end].to_string()));
            }
            c => bail!("Unexpected character {c:?} in scaling expression {src:?}"),
        }
    }

    Ok(tokens)
}

/// Lex one maximal digit-led word: integer, float, or `0x`/`0b` byte literal
fn number(word: &str) -> eyre::Result<Token> {
    if let Some(digits) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        return hex_literal(word, digits);
    }
    if let Some(digits) = word.strip_prefix("0b").or_else(|| word.strip_prefix("0B")) {
        return bits_literal(word, digits);
    }
    if word.contains('.') {
        let Ok(value) = word.parse::<f64>() else {
            bail!("Malformed float literal: {word:?}");
        };
        return Ok(Token::Float(value));
    }
    let Ok(value) = word.parse::<i64>() else {
        bail!("Malformed integer literal: {word:?}");
    };
    Ok(Token::Int(value))
}

/// `0x` literals become big-endian byte strings, zero-padded on the left to a
/// whole number of bytes.
fn hex_literal(word: &str, digits: &str) -> eyre::Result<Token> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Malformed hex literal: {word:?}");
    }
    let padded = if digits.len() % 2 == 0 {
        digits.to_string()
    } else {
        format!("0{digits}")
    };
    let bytes = hex::decode(padded)?;
    Ok(Token::Bytes(bytes))
}

/// `0b` literals become big-endian byte strings of the minimal width that
/// holds the value, at least one byte.
fn bits_literal(word: &str, digits: &str) -> eyre::Result<Token> {
    if digits.is_empty() {
        bail!("Malformed binary literal: {word:?}");
    }
    let Ok(value) = u64::from_str_radix(digits, 2) else {
        bail!("Malformed binary literal: {word:?}");
    };
    let be = value.to_be_bytes();
    let leading = be.iter().take_while(|&&b| b == 0).count().min(be.len() - 1);
    Ok(Token::Bytes(be[leading..].to_vec()))
}

//! Arithmetic over amount text.
//!
//! Debit/credit cells accept small expressions (`12.50 + 3`, `(40 - 4) / 3`)
//! instead of bare numbers. Evaluation is decimal-exact; every failure
//! (unknown character, unbalanced parenthesis, division by zero, overflow)
//! collapses to `None` so callers can treat it as "nothing typed".

use rust_decimal::Decimal;

/// Deepest parenthesis nesting accepted before the text counts as malformed.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Op(char),
    LParen,
    RParen,
}

/// Evaluates `input` as an expression over `+ - * /` and parentheses.
///
/// Returns `None` for empty or malformed text.
#[must_use]
pub fn evaluate(input: &str) -> Option<Decimal> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return None;
    }
    let mut pos = 0;
    let value = eval_additive(&tokens, &mut pos)?;
    // Trailing tokens mean the text was not a single expression.
    (pos == tokens.len()).then_some(value)
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return None;
                }
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' || c == ',' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',')
                {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(parse_number(&raw)?));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

/// `,` is a thousands separator when a `.` is present, a decimal separator
/// otherwise.
fn parse_number(raw: &str) -> Option<Decimal> {
    let normalized = if raw.contains('.') {
        raw.replace(',', "")
    } else {
        raw.replace(',', ".")
    };
    if normalized == "." {
        return None;
    }
    normalized.parse::<Decimal>().ok()
}

fn eval_additive(tokens: &[Token], pos: &mut usize) -> Option<Decimal> {
    let mut result = eval_multiplicative(tokens, pos)?;
    while let Some(token) = tokens.get(*pos) {
        match token {
            Token::Op('+') => {
                *pos += 1;
                result = result.checked_add(eval_multiplicative(tokens, pos)?)?;
            }
            Token::Op('-') => {
                *pos += 1;
                result = result.checked_sub(eval_multiplicative(tokens, pos)?)?;
            }
            _ => break,
        }
    }
    Some(result)
}

fn eval_multiplicative(tokens: &[Token], pos: &mut usize) -> Option<Decimal> {
    let mut result = eval_unary(tokens, pos)?;
    while let Some(token) = tokens.get(*pos) {
        match token {
            Token::Op('*') => {
                *pos += 1;
                result = result.checked_mul(eval_unary(tokens, pos)?)?;
            }
            Token::Op('/') => {
                *pos += 1;
                result = result.checked_div(eval_unary(tokens, pos)?)?;
            }
            _ => break,
        }
    }
    Some(result)
}

fn eval_unary(tokens: &[Token], pos: &mut usize) -> Option<Decimal> {
    let mut negate = false;
    loop {
        match tokens.get(*pos)? {
            Token::Op('-') => negate = !negate,
            Token::Op('+') => {}
            _ => break,
        }
        *pos += 1;
    }
    let value = eval_atom(tokens, pos)?;
    Some(if negate { -value } else { value })
}

fn eval_atom(tokens: &[Token], pos: &mut usize) -> Option<Decimal> {
    match tokens.get(*pos)? {
        Token::Number(value) => {
            *pos += 1;
            Some(*value)
        }
        Token::LParen => {
            *pos += 1;
            let value = eval_additive(tokens, pos)?;
            if tokens.get(*pos) != Some(&Token::RParen) {
                return None;
            }
            *pos += 1;
            Some(value)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn evaluates_bare_numbers() {
        assert_eq!(evaluate("12.50"), Some(dec("12.50")));
        assert_eq!(evaluate("  7 "), Some(dec("7")));
        assert_eq!(evaluate("10,5"), Some(dec("10.5")));
        assert_eq!(evaluate("1,234.50"), Some(dec("1234.50")));
    }

    #[test]
    fn respects_precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4"), Some(dec("14")));
        assert_eq!(evaluate("(2 + 3) * 4"), Some(dec("20")));
        assert_eq!(evaluate("10 / 4"), Some(dec("2.5")));
        assert_eq!(evaluate("-3 + 5"), Some(dec("2")));
        assert_eq!(evaluate("4 - -1"), Some(dec("5")));
    }

    #[test]
    fn malformed_text_is_none() {
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("abc"), None);
        assert_eq!(evaluate("1 +"), None);
        assert_eq!(evaluate("(1 + 2"), None);
        assert_eq!(evaluate("1 2"), None);
        assert_eq!(evaluate("5 / 0"), None);
        assert_eq!(evaluate("."), None);
        assert_eq!(evaluate("1)"), None);
    }

    #[test]
    fn long_sign_runs_fold_without_recursion() {
        let odd = format!("{}1", "-".repeat(100_001));
        let even = format!("{}1", "-".repeat(100_000));
        assert_eq!(evaluate(&odd), Some(dec("-1")));
        assert_eq!(evaluate(&even), Some(dec("1")));
        assert_eq!(evaluate(&"-".repeat(100_000)), None);
    }

    #[test]
    fn nesting_is_capped() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(evaluate(&nested(MAX_DEPTH)), Some(dec("1")));
        assert_eq!(evaluate(&nested(MAX_DEPTH + 1)), None);
        assert_eq!(evaluate(&nested(200_000)), None);
    }
}

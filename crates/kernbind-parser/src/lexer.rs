//! Tokenizer for the textual IR.

use crate::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    /// Bare word: keywords, type names, flags.
    Word(String),
    /// `%name`
    Local(String),
    /// `@name`
    Global(String),
    Int(i64),
    /// Integer with a `u` suffix.
    Uint(u64),
    Float(f32),
    Arrow,
    Punct(char),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word(w) => write!(f, "'{w}'"),
            Self::Local(n) => write!(f, "'%{n}'"),
            Self::Global(n) => write!(f, "'@{n}'"),
            Self::Int(v) => write!(f, "'{v}'"),
            Self::Uint(v) => write!(f, "'{v}u'"),
            Self::Float(v) => write!(f, "'{v:?}'"),
            Self::Arrow => write!(f, "'->'"),
            Self::Punct(c) => write!(f, "'{c}'"),
        }
    }
}

/// A token and the 1-based line it starts on.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut line = 1;

    while let Some(&(start, c)) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' if source[start..].starts_with("//") => {
                while chars.next_if(|&(_, c)| c != '\n').is_some() {}
            }
            '%' | '@' => {
                chars.next();
                let name = take_while(source, &mut chars, is_name_char);
                if name.is_empty() {
                    return Err(ParseError::UnexpectedChar { line, ch: c });
                }
                let name = name.to_string();
                tokens.push(Spanned {
                    token: if c == '%' {
                        Token::Local(name)
                    } else {
                        Token::Global(name)
                    },
                    line,
                });
            }
            '-' if source[start..].starts_with("->") => {
                chars.next();
                chars.next();
                tokens.push(Spanned {
                    token: Token::Arrow,
                    line,
                });
            }
            '-' | '0'..='9' => {
                chars.next();
                let rest = take_while(source, &mut chars, |c| {
                    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '+'
                });
                let text = &source[start..start + c.len_utf8() + rest.len()];
                tokens.push(Spanned {
                    token: number(text, line)?,
                    line,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let word = take_while(source, &mut chars, is_name_char);
                tokens.push(Spanned {
                    token: Token::Word(word.to_string()),
                    line,
                });
            }
            '(' | ')' | '{' | '}' | '<' | '>' | ',' | ':' | '=' | '|' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Punct(c),
                    line,
                });
            }
            _ => return Err(ParseError::UnexpectedChar { line, ch: c }),
        }
    }
    Ok(tokens)
}

fn take_while<'a>(
    source: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
    pred: impl Fn(char) -> bool,
) -> &'a str {
    let start = chars.peek().map_or(source.len(), |&(i, _)| i);
    let mut end = start;
    while let Some((i, c)) = chars.next_if(|&(_, c)| pred(c)) {
        end = i + c.len_utf8();
    }
    &source[start..end]
}

fn number(text: &str, line: usize) -> Result<Token, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        line,
        text: text.to_string(),
    };
    if let Some(digits) = text.strip_suffix('u') {
        let value = match digits.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => digits.parse(),
        };
        return value.map(Token::Uint).map_err(|_| invalid());
    }
    if let Some(hex) = text.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16)
            .map(Token::Int)
            .map_err(|_| invalid());
    }
    if text.contains(['.', 'e', 'E']) {
        return text.parse().map(Token::Float).map_err(|_| invalid());
    }
    text.parse().map(Token::Int).map_err(|_| invalid())
}

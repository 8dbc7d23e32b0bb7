use crate::error::{LangError, LangResult};

use super::{Token, TokenKind};

/// Matches brackets in a flat token stream, turning each bracketed
/// stretch into a single `Group` token with comma-separated fields.
pub fn group(tokens: Vec<Token>) -> LangResult<Vec<Token>> {
    let mut cursor = Cursor {
        tokens: tokens.into_iter().peekable(),
    };

    let out = cursor.sequence()?;

    // the top-level sequence only stops at end of input or a stray token
    match cursor.tokens.next() {
        None => Ok(out),
        Some(stray) => Err(LangError::syntax(
            stray.site,
            format!("unmatched {}", stray.describe()),
        )),
    }
}

struct Cursor {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
}

impl Cursor {
    /// Collects grouped tokens until end of input (top level) or until
    /// the matching close bracket, which is left unconsumed.
    fn sequence(&mut self) -> LangResult<Vec<Token>> {
        let mut out = Vec::new();

        loop {
            match self.tokens.peek() {
                None | Some(Token {
                    kind: TokenKind::Close(_) | TokenKind::Comma,
                    ..
                }) => return Ok(out),
                Some(_) => {}
            }

            let token = self.tokens.next().expect("peeked above");

            match token.kind {
                TokenKind::Open(bracket) => {
                    let open = Token::new(TokenKind::Open(bracket), token.site);
                    let fields = self.fields(&open)?;

                    let close_site = match self.tokens.next() {
                        Some(close) => match close.kind {
                            TokenKind::Close(b) if b == bracket => close.site,
                            _ => {
                                return Err(LangError::syntax(
                                    close.site,
                                    format!(
                                        "expected '{}', found {}",
                                        bracket.close(),
                                        close.describe()
                                    ),
                                ));
                            }
                        },
                        None => {
                            return Err(LangError::syntax(
                                open.site,
                                format!("unclosed '{}'", bracket.open()),
                            ));
                        }
                    };

                    out.push(Token::new(
                        TokenKind::Group { bracket, fields },
                        open.site.merge(close_site),
                    ));
                }
                _ => out.push(token),
            }
        }
    }

    /// Comma-separated fields of one group. Empty fields and trailing
    /// commas are rejected at the offending comma.
    fn fields(&mut self, open: &Token) -> LangResult<Vec<Vec<Token>>> {
        let mut fields = Vec::new();

        loop {
            let field = self.sequence()?;

            match self.tokens.peek() {
                Some(Token {
                    kind: TokenKind::Comma,
                    site,
                }) => {
                    let comma_site = *site;

                    if field.is_empty() {
                        return Err(LangError::syntax(comma_site, "empty group field"));
                    }

                    fields.push(field);
                    self.tokens.next();

                    // a close right after the comma means a trailing comma
                    if matches!(
                        self.tokens.peek(),
                        Some(Token {
                            kind: TokenKind::Close(_),
                            ..
                        }) | None
                    ) {
                        return Err(LangError::syntax(comma_site, "trailing comma in group"));
                    }
                }
                _ => {
                    if !field.is_empty() {
                        fields.push(field);
                    } else if !fields.is_empty() {
                        // unreachable thanks to the trailing-comma check,
                        // kept as a guard for direct callers
                        return Err(LangError::syntax(open.site, "empty group field"));
                    }

                    return Ok(fields);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::{tokenize, Bracket};
    use helios_primitives::Source;

    fn grouped(text: &str) -> LangResult<Vec<Token>> {
        group(tokenize(&Source::new(0, "test.hl", text)).unwrap())
    }

    fn field_counts(text: &str) -> Vec<usize> {
        grouped(text)
            .unwrap()
            .into_iter()
            .filter_map(|t| match t.kind {
                TokenKind::Group { fields, .. } => Some(fields.len()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fields_split_on_commas() {
        assert_eq!(field_counts("(a, b, c)"), vec![3]);
        assert_eq!(field_counts("()"), vec![0]);
        assert_eq!(field_counts("{x = 1; x}"), vec![1]);
    }

    #[test]
    fn groups_nest() {
        let tokens = grouped("f(a, g(b), [c])").unwrap();
        let TokenKind::Group { fields, .. } = &tokens[1].kind else {
            panic!("expected group");
        };
        assert_eq!(fields.len(), 3);
        assert!(matches!(
            fields[1][1].kind,
            TokenKind::Group {
                bracket: Bracket::Paren,
                ..
            }
        ));
    }

    #[test]
    fn bracket_errors() {
        assert!(grouped("(a").is_err()); // unclosed
        assert!(grouped("a)").is_err()); // stray close
        assert!(grouped("(a]").is_err()); // mismatch
        assert!(grouped("(a,,b)").is_err()); // empty field
        assert!(grouped("(a,)").is_err()); // trailing comma
    }
}

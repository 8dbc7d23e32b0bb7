mod group;
mod token;

pub use group::group;
pub use token::{Bracket, Sym, Token, TokenKind};

use helios_primitives::{Site, Source};
use num_bigint::BigInt;

use crate::error::{LangError, LangResult};

/// Flat tokenization of a whole source.
pub fn tokenize(source: &Source) -> LangResult<Vec<Token>> {
    Lexer::new(source).collect()
}

/// Flat tokenization followed by bracket grouping.
pub fn tokenize_grouped(source: &Source) -> LangResult<Vec<Token>> {
    group(tokenize(source)?)
}

/// Streaming lexer. Emits flat tokens lazily so callers can peek the
/// leading purpose header without paying for a full tokenization.
pub struct Lexer<'a> {
    bytes: &'a [u8],
    source: helios_primitives::SourceId,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a Source) -> Self {
        Lexer {
            bytes: source.bytes(),
            source: source.id(),
            pos: 0,
        }
    }

    fn site_from(&self, start: usize) -> Site {
        Site::spanning(self.source, start, self.pos)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> LangResult<()> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;

                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Err(LangError::syntax(
                                    self.site_from(start),
                                    "unterminated block comment",
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> LangResult<Option<Token>> {
        self.skip_trivia()?;

        let start = self.pos;

        let Some(b) = self.bump() else {
            return Ok(None);
        };

        let kind = match b {
            b'(' => TokenKind::Open(Bracket::Paren),
            b')' => TokenKind::Close(Bracket::Paren),
            b'[' => TokenKind::Open(Bracket::Square),
            b']' => TokenKind::Close(Bracket::Square),
            b'{' => TokenKind::Open(Bracket::Brace),
            b'}' => TokenKind::Close(Bracket::Brace),
            b',' => TokenKind::Comma,
            b'|' if self.eat(b'|') => TokenKind::Sym(Sym::PipePipe),
            b'&' if self.eat(b'&') => TokenKind::Sym(Sym::AmpAmp),
            b'=' if self.eat(b'=') => TokenKind::Sym(Sym::EqEq),
            b'=' if self.eat(b'>') => TokenKind::Sym(Sym::FatArrow),
            b'=' => TokenKind::Sym(Sym::Assign),
            b'!' if self.eat(b'=') => TokenKind::Sym(Sym::BangEq),
            b'!' => TokenKind::Sym(Sym::Bang),
            b'<' if self.eat(b'=') => TokenKind::Sym(Sym::Le),
            b'<' => TokenKind::Sym(Sym::Lt),
            b'>' if self.eat(b'=') => TokenKind::Sym(Sym::Ge),
            b'>' => TokenKind::Sym(Sym::Gt),
            b':' if self.eat(b':') => TokenKind::Sym(Sym::ColonColon),
            b':' => TokenKind::Sym(Sym::Colon),
            b'-' if self.eat(b'>') => TokenKind::Sym(Sym::Arrow),
            b'-' => TokenKind::Sym(Sym::Minus),
            b'+' => TokenKind::Sym(Sym::Plus),
            b'*' => TokenKind::Sym(Sym::Star),
            b'/' => TokenKind::Sym(Sym::Slash),
            b'%' => TokenKind::Sym(Sym::Percent),
            b'.' => TokenKind::Sym(Sym::Dot),
            b';' => TokenKind::Sym(Sym::Semi),
            b'#' => self.byte_array(start)?,
            b'"' => self.string_literal(start)?,
            b'0'..=b'9' => self.int_literal(start, b)?,
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.word(start),
            other => {
                return Err(LangError::syntax(
                    self.site_from(start),
                    format!("unexpected character '{}'", other.escape_ascii()),
                ));
            }
        };

        Ok(Some(Token::new(kind, self.site_from(start))))
    }

    fn word(&mut self, start: usize) -> TokenKind {
        while let Some(b) = self.peek() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("ascii identifier")
            .to_string();

        match text.as_str() {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Word(text),
        }
    }

    fn int_literal(&mut self, start: usize, first: u8) -> LangResult<TokenKind> {
        let (radix, digits_from) = if first == b'0' {
            match self.peek() {
                Some(b'b') | Some(b'B') => {
                    self.pos += 1;
                    (2, self.pos)
                }
                Some(b'o') | Some(b'O') => {
                    self.pos += 1;
                    (8, self.pos)
                }
                Some(b'x') | Some(b'X') => {
                    self.pos += 1;
                    (16, self.pos)
                }
                Some(b) if b.is_ascii_alphabetic() => {
                    self.pos += 1;
                    return Err(LangError::syntax(
                        self.site_from(start),
                        format!("invalid integer literal prefix '0{}'", b as char),
                    ));
                }
                _ => (10, start),
            }
        } else {
            (10, start)
        };

        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }

        let digits: Vec<u8> = self.bytes[digits_from..self.pos]
            .iter()
            .copied()
            .filter(|b| *b != b'_')
            .collect();

        if digits.is_empty() {
            return Err(LangError::syntax(
                self.site_from(start),
                "integer literal without digits",
            ));
        }

        BigInt::parse_bytes(&digits, radix)
            .map(TokenKind::Int)
            .ok_or_else(|| {
                LangError::syntax(
                    self.site_from(start),
                    format!("invalid digits for base-{radix} integer literal"),
                )
            })
    }

    fn byte_array(&mut self, start: usize) -> LangResult<TokenKind> {
        let digits_from = self.pos;

        while let Some(b) = self.peek() {
            if b.is_ascii_hexdigit() {
                self.pos += 1;
            } else {
                break;
            }
        }

        let digits = &self.bytes[digits_from..self.pos];

        if digits.len() % 2 != 0 {
            return Err(LangError::syntax(
                self.site_from(start),
                "byte-array literal needs an even number of hex digits",
            ));
        }

        let bytes = hex::decode(digits).expect("hex digits only");

        Ok(TokenKind::Bytes(bytes))
    }

    /// The literal's bytes are collected raw (escapes resolved) and
    /// decoded as UTF-8 once the closing quote is seen, so multi-byte
    /// codepoints in the source survive intact.
    fn string_literal(&mut self, start: usize) -> LangResult<TokenKind> {
        let mut out: Vec<u8> = Vec::new();

        loop {
            match self.bump() {
                Some(b'"') => {
                    return String::from_utf8(out).map(TokenKind::Str).map_err(|_| {
                        LangError::syntax(
                            self.site_from(start),
                            "string literal is not valid utf-8",
                        )
                    });
                }
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'"') => out.push(b'"'),
                    Some(other) => {
                        return Err(LangError::syntax(
                            self.site_from(start),
                            format!("unknown escape '\\{}'", other.escape_ascii()),
                        ));
                    }
                    None => {
                        return Err(LangError::syntax(
                            self.site_from(start),
                            "unterminated string literal",
                        ));
                    }
                },
                Some(b) => out.push(b),
                None => {
                    return Err(LangError::syntax(
                        self.site_from(start),
                        "unterminated string literal",
                    ));
                }
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = LangResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Reads just the `purpose name` header off the front of a source,
/// without tokenizing the rest.
pub fn peek_purpose(source: &Source) -> LangResult<(String, String)> {
    let mut lexer = Lexer::new(source);

    let header_site = Site::at(source.id(), 0);

    let purpose = match lexer.next().transpose()? {
        Some(token) => match token.kind {
            TokenKind::Word(w) => w,
            _ => {
                return Err(LangError::syntax(
                    token.site,
                    format!("expected purpose keyword, found {}", token.describe()),
                ))
            }
        },
        None => return Err(LangError::syntax(header_site, "empty source")),
    };

    let name = match lexer.next().transpose()? {
        Some(token) => match token.kind {
            TokenKind::Word(w) => w,
            _ => {
                return Err(LangError::syntax(
                    token.site,
                    format!("expected script name, found {}", token.describe()),
                ))
            }
        },
        None => return Err(LangError::syntax(header_site, "missing script name")),
    };

    Ok((purpose, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> LangResult<Vec<Token>> {
        tokenize(&Source::new(0, "test.hl", text))
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn words_and_bools() {
        assert_eq!(
            kinds("foo true false _bar"),
            vec![
                TokenKind::Word("foo".into()),
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Word("_bar".into()),
            ]
        );
    }

    #[test]
    fn integer_bases() {
        assert_eq!(
            kinds("10 0b101 0o17 0xfF"),
            vec![
                TokenKind::Int(10.into()),
                TokenKind::Int(5.into()),
                TokenKind::Int(15.into()),
                TokenKind::Int(255.into()),
            ]
        );
    }

    #[test]
    fn unknown_base_prefix_is_rejected() {
        assert!(matches!(lex("0y12"), Err(LangError::Syntax { .. })));
    }

    #[test]
    fn byte_array_literals() {
        assert_eq!(
            kinds("#deadbeef #"),
            vec![
                TokenKind::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
                TokenKind::Bytes(vec![]),
            ]
        );
        assert!(lex("#abc").is_err());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\t\"\\""#),
            vec![TokenKind::Str("a\nb\t\"\\".into())]
        );
        assert!(lex("\"open").is_err());
    }

    #[test]
    fn strings_keep_multi_byte_codepoints() {
        assert_eq!(
            kinds(r#""héllo wörld ✓""#),
            vec![TokenKind::Str("héllo wörld ✓".into())]
        );
    }

    #[test]
    fn broken_utf_8_in_a_string_is_rejected() {
        let source = Source::new(0, "test.hl", vec![b'"', 0xff, 0xfe, b'"']);
        assert!(matches!(tokenize(&source), Err(LangError::Syntax { .. })));
    }

    #[test]
    fn comments_are_discarded() {
        assert_eq!(
            kinds("a // line\n /* block\n */ b"),
            vec![TokenKind::Word("a".into()), TokenKind::Word("b".into())]
        );
        assert!(matches!(lex("/* open"), Err(LangError::Syntax { .. })));
    }

    #[test]
    fn multi_char_symbols_win() {
        assert_eq!(
            kinds("a==b!=c<=d>=e&&f||g::h->i=>j"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Sym(Sym::EqEq),
                TokenKind::Word("b".into()),
                TokenKind::Sym(Sym::BangEq),
                TokenKind::Word("c".into()),
                TokenKind::Sym(Sym::Le),
                TokenKind::Word("d".into()),
                TokenKind::Sym(Sym::Ge),
                TokenKind::Word("e".into()),
                TokenKind::Sym(Sym::AmpAmp),
                TokenKind::Word("f".into()),
                TokenKind::Sym(Sym::PipePipe),
                TokenKind::Word("g".into()),
                TokenKind::Sym(Sym::ColonColon),
                TokenKind::Word("h".into()),
                TokenKind::Sym(Sym::Arrow),
                TokenKind::Word("i".into()),
                TokenKind::Sym(Sym::FatArrow),
                TokenKind::Word("j".into()),
            ]
        );
    }

    #[test]
    fn purpose_peek_reads_only_the_header() {
        let source = Source::new(0, "t.hl", "spending vault\nfunc main() -> Bool { true }");
        assert_eq!(
            peek_purpose(&source).unwrap(),
            ("spending".to_string(), "vault".to_string())
        );

        // works even when the body would fail to lex
        let broken = Source::new(0, "t.hl", "minting nft /* open");
        assert_eq!(
            peek_purpose(&broken).unwrap(),
            ("minting".to_string(), "nft".to_string())
        );
    }

    #[test]
    fn sites_cover_tokens() {
        let tokens = lex("ab + cd").unwrap();
        assert_eq!(tokens[0].site.start, 0);
        assert_eq!(tokens[0].site.end, Some(2));
        assert_eq!(tokens[2].site.start, 5);
    }
}

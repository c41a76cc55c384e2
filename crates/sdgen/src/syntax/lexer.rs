//! Tokenization of the language description.

use super::SyntaxError;
use crate::regex::ClassBits;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A bare identifier: section keywords, attribute names, definition
    /// names.
    Ident(String),
    /// A quoted terminal name or literal, undecoded.
    Str(String),
    /// A `<bracketed>` nonterminal name.
    Nonterm(String),
    /// A `[...]` character class, decoded.
    Class(ClassBits),
    Number(i32),
    /// A `#n` semantic action marker.
    Semantic(i32),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    line: u32,
}

impl<'src> Lexer<'src> {
    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'%') => {
                    // Comments run from one percent sign to the next.
                    let line = self.line;
                    self.bump();
                    loop {
                        match self.bump() {
                            Some(b'%') => break,
                            Some(_) => {}
                            None => {
                                return Err(SyntaxError::Parse {
                                    line,
                                    message: "Unterminated comment".into(),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Decode one character, interpreting backslash escapes: octal and hex
    /// codes plus the usual letter escapes.
    fn escape(&mut self) -> Result<u8, SyntaxError> {
        let Some(first) = self.bump() else {
            return Err(self.error("Unterminated escape"));
        };
        if first != b'\\' {
            return Ok(first);
        }

        match self.peek() {
            None => Ok(b'\\'),
            Some(b'x') => {
                self.bump();
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 2 {
                    match self.peek().and_then(|ch| (ch as char).to_digit(16)) {
                        Some(digit) => {
                            self.bump();
                            value = value * 16 + digit;
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    Ok(b'x')
                } else {
                    Ok(value as u8)
                }
            }
            Some(ch) if ch.is_ascii_digit() => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 3 {
                    match self.peek().and_then(|ch| (ch as char).to_digit(8)) {
                        Some(digit) if value * 8 + digit < 0xFF => {
                            self.bump();
                            value = value * 8 + digit;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                Ok(value as u8)
            }
            Some(ch) => {
                self.bump();
                Ok(match ch {
                    b'a' => 0x07,
                    b'b' => 0x08,
                    b'e' => 0x1B,
                    b'f' => 0x0C,
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'v' => 0x0B,
                    other => other,
                })
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, SyntaxError> {
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => return Err(self.error("Missing closing quote")),
                Some(ch) if ch == quote => {
                    self.bump();
                    return Ok(TokenKind::Str(text));
                }
                Some(b'\\') => {
                    // Keep the escape for later decoding, but step over a
                    // possibly quoted character.
                    self.bump();
                    text.push('\\');
                    if let Some(ch) = self.bump() {
                        text.push(ch as char);
                    }
                }
                Some(ch) => {
                    self.bump();
                    text.push(ch as char);
                }
            }
        }
    }

    fn class(&mut self) -> Result<TokenKind, SyntaxError> {
        let mut bits = ClassBits::default();
        loop {
            match self.peek() {
                None => return Err(self.error("Missing closing bracket")),
                Some(b']') => {
                    self.bump();
                    return Ok(TokenKind::Class(bits));
                }
                _ => {
                    let low = self.escape()?;
                    if self.peek() == Some(b'-') && self.source.get(self.pos + 1) != Some(&b']') {
                        self.bump();
                        let high = self.escape()?;
                        if low > high {
                            return Err(self.error("Invalid range in character class"));
                        }
                        bits = bits.union(ClassBits::range(low, high));
                    } else {
                        bits.set(low);
                    }
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_trivia()?;
        let line = self.line;
        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(b'"') | Some(b'\'') => {
                let quote = self.bump().unwrap();
                self.string(quote)?
            }
            Some(b'<') => {
                self.bump();
                let mut name = String::new();
                loop {
                    match self.bump() {
                        None | Some(b'\n') => return Err(self.error("Missing closing bracket")),
                        Some(b'>') => break,
                        Some(ch) => name.push(ch as char),
                    }
                }
                TokenKind::Nonterm(name)
            }
            Some(b'[') => {
                self.bump();
                self.class()?
            }
            Some(b'#') => {
                self.bump();
                let mut value = 0i32;
                let mut digits = 0;
                while let Some(ch) = self.peek().filter(u8::is_ascii_digit) {
                    self.bump();
                    value = value * 10 + (ch - b'0') as i32;
                    digits += 1;
                }
                if digits == 0 {
                    return Err(self.error("Semantic marker needs a number"));
                }
                TokenKind::Semantic(value)
            }
            Some(ch) if ch.is_ascii_digit() => {
                let mut value = 0i32;
                while let Some(ch) = self.peek().filter(u8::is_ascii_digit) {
                    self.bump();
                    value = value * 10 + (ch - b'0') as i32;
                }
                TokenKind::Number(value)
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == b'_' => {
                let mut name = String::new();
                while let Some(ch) = self
                    .peek()
                    .filter(|ch| ch.is_ascii_alphanumeric() || *ch == b'_')
                {
                    self.bump();
                    name.push(ch as char);
                }
                TokenKind::Ident(name)
            }
            Some(ch @ (b';' | b',' | b'=' | b'|' | b'(' | b')' | b'{' | b'}' | b'*' | b'+'
            | b'-' | b'~' | b':' | b'/')) => {
                self.bump();
                TokenKind::Punct(ch as char)
            }
            Some(ch) => {
                return Err(self.error(format!("Unexpected character '{}'", ch as char)));
            }
        };
        Ok(Token { kind, line })
    }
}

/// Decode the escapes of a quoted literal into raw bytes.
pub fn decode_string(text: &str) -> Vec<u8> {
    let mut lexer = Lexer {
        source: text.as_bytes(),
        pos: 0,
        line: 1,
    };
    let mut bytes = Vec::new();
    while lexer.peek().is_some() {
        match lexer.escape() {
            Ok(byte) => bytes.push(byte),
            Err(_) => break,
        }
    }
    bytes
}

pub fn scan(source: &[u8]) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer {
        source,
        pos: 0,
        line: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoketest() {
        let source = br#"
            IDENT sample; % a comment %
            SCANNER
                "int" = [0-9]+, INSTALL;
            PARSER
                <s> = "int" #3;
        "#;
        let kinds: Vec<TokenKind> = scan(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect();
        assert!(matches!(
            &kinds[..],
            [
                TokenKind::Ident(ident),
                TokenKind::Ident(sample),
                TokenKind::Punct(';'),
                TokenKind::Ident(scanner),
                TokenKind::Str(int1),
                TokenKind::Punct('='),
                TokenKind::Class(_),
                TokenKind::Punct('+'),
                TokenKind::Punct(','),
                TokenKind::Ident(install),
                TokenKind::Punct(';'),
                TokenKind::Ident(parser),
                TokenKind::Nonterm(s),
                TokenKind::Punct('='),
                TokenKind::Str(int2),
                TokenKind::Semantic(3),
                TokenKind::Punct(';'),
                TokenKind::Eof,
            ] if ident == "IDENT"
                && sample == "sample"
                && scanner == "SCANNER"
                && int1 == "int"
                && install == "INSTALL"
                && parser == "PARSER"
                && s == "s"
                && int2 == "int"
        ));
    }

    #[test]
    fn escapes_decode() {
        assert_eq!(decode_string(r"a\tb"), b"a\tb");
        assert_eq!(decode_string(r"\x41\102"), b"AB");
        assert_eq!(decode_string(r"\n"), b"\n");
    }

    #[test]
    fn classes_support_ranges_and_escapes() {
        let tokens = scan(br"[a-f\ ]").unwrap();
        let TokenKind::Class(bits) = &tokens[0].kind else {
            panic!("expected a class");
        };
        assert!(bits.test(b'c'));
        assert!(bits.test(b' '));
        assert!(!bits.test(b'g'));
    }
}

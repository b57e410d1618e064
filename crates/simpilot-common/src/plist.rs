//! Reader for the OpenStep ("old-style ASCII") property-list text that
//! `simctl listapps` prints.
//!
//! Only the subset simctl emits is supported: dictionaries, arrays, quoted and
//! unquoted strings, and `<hex data>` blobs (kept as their raw text).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    String(String),
    Array(Vec<PlistValue>),
    /// Entries in document order
    Dict(Vec<(String, PlistValue)>),
}

impl PlistValue {
    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        match self {
            Self::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[(String, PlistValue)] {
        match self {
            Self::Dict(entries) => entries,
            _ => &[],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlistError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("trailing content at offset {0}")]
    Trailing(usize),
}

/// Parse a whole document into a single value.
pub fn parse(input: &str) -> Result<PlistValue, PlistError> {
    let mut parser = Parser {
        chars: input.char_indices().collect(),
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    match parser.peek() {
        Some((offset, _)) => Err(PlistError::Trailing(offset)),
        None => Ok(value),
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).map(|(_, c)| *c);
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some((_, c)) if c.is_whitespace() => self.pos += 1,
                Some((_, '/')) => {
                    let next = self.chars.get(self.pos + 1).map(|(_, c)| *c);
                    match next {
                        Some('/') => {
                            while let Some((_, c)) = self.peek() {
                                self.pos += 1;
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.pos += 2;
                            while let Some((_, c)) = self.peek() {
                                self.pos += 1;
                                if c == '*' && matches!(self.peek(), Some((_, '/'))) {
                                    self.pos += 1;
                                    break;
                                }
                            }
                        }
                        _ => return,
                    }
                }
                _ => return,
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), PlistError> {
        self.skip_ws();
        match self.peek() {
            Some((_, c)) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some((offset, found)) => Err(PlistError::Unexpected { found, offset }),
            None => Err(PlistError::UnexpectedEof),
        }
    }

    fn value(&mut self) -> Result<PlistValue, PlistError> {
        self.skip_ws();
        match self.peek() {
            Some((_, '{')) => self.dict(),
            Some((_, '(')) => self.array(),
            Some((_, '<')) => self.data(),
            Some(_) => self.string().map(PlistValue::String),
            None => Err(PlistError::UnexpectedEof),
        }
    }

    fn dict(&mut self) -> Result<PlistValue, PlistError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if let Some((_, '}')) = self.peek() {
                self.pos += 1;
                return Ok(PlistValue::Dict(entries));
            }
            let key = self.string()?;
            self.expect('=')?;
            let value = self.value()?;
            self.expect(';')?;
            entries.push((key, value));
        }
    }

    fn array(&mut self) -> Result<PlistValue, PlistError> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if let Some((_, ')')) = self.peek() {
                self.pos += 1;
                return Ok(PlistValue::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some((_, ',')) => self.pos += 1,
                Some((_, ')')) => {}
                Some((offset, found)) => return Err(PlistError::Unexpected { found, offset }),
                None => return Err(PlistError::UnexpectedEof),
            }
        }
    }

    fn data(&mut self) -> Result<PlistValue, PlistError> {
        self.expect('<')?;
        let mut raw = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(PlistValue::String(raw)),
                Some(c) => raw.push(c),
                None => return Err(PlistError::UnexpectedEof),
            }
        }
    }

    fn string(&mut self) -> Result<String, PlistError> {
        self.skip_ws();
        match self.peek() {
            Some((_, '"')) => self.quoted(),
            Some((_, c)) if is_bare_char(c) => {
                let mut out = String::new();
                while let Some((_, c)) = self.peek() {
                    if !is_bare_char(c) {
                        break;
                    }
                    out.push(c);
                    self.pos += 1;
                }
                Ok(out)
            }
            Some((offset, found)) => Err(PlistError::Unexpected { found, offset }),
            None => Err(PlistError::UnexpectedEof),
        }
    }

    fn quoted(&mut self) -> Result<String, PlistError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err(PlistError::UnexpectedEof),
                },
                Some(c) => out.push(c),
                None => return Err(PlistError::UnexpectedEof),
            }
        }
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '+' | '/' | ':' | '.' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = r#"
        {
            "com.example.App" =     {
                ApplicationType = User;
                CFBundleDisplayName = "Example App";
                GroupContainers =         {
                };
                SBAppTags =         (
                    hidden,
                    "with space"
                );
            };
        }"#;

        let value = parse(doc).unwrap();
        let app = value.get("com.example.App").unwrap();
        assert_eq!(app.get("ApplicationType").and_then(|v| v.as_str()), Some("User"));
        assert_eq!(
            app.get("CFBundleDisplayName").and_then(|v| v.as_str()),
            Some("Example App")
        );
        assert_eq!(app.get("GroupContainers"), Some(&PlistValue::Dict(vec![])));
        assert_eq!(
            app.get("SBAppTags"),
            Some(&PlistValue::Array(vec![
                PlistValue::String("hidden".to_string()),
                PlistValue::String("with space".to_string()),
            ]))
        );
    }

    #[test]
    fn test_quoted_escapes_and_data() {
        let value = parse(r#"{ a = "say \"hi\""; b = <0fa1 22>; }"#).unwrap();
        assert_eq!(value.get("a").and_then(|v| v.as_str()), Some("say \"hi\""));
        assert_eq!(value.get("b").and_then(|v| v.as_str()), Some("0fa1 22"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let value = parse("// header\n{ /* inline */ key = value; }").unwrap();
        assert_eq!(value.get("key").and_then(|v| v.as_str()), Some("value"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("{ a = b "), Err(PlistError::UnexpectedEof));
        assert!(matches!(parse("{ a b; }"), Err(PlistError::Unexpected { found: 'b', .. })));
        assert!(matches!(parse("{ } extra"), Err(PlistError::Trailing(_))));
    }
}

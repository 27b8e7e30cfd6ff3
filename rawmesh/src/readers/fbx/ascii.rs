//! ASCII FBX 7.x tokenizer and parser
//!
//! Grammar, line breaks being insignificant:
//!
//! ```text
//! node     := NAME ':' [value (',' value)*] ['{' node* '}']
//! value    := NUMBER | STRING | BAREWORD | '*' NUMBER
//! ```
//!
//! A `*N` value announces an array whose elements live in the child node
//! `a`; the array is folded back into the owning node's properties so both
//! encodings produce identical trees. `;` starts a comment.

use super::node::{FbxNode, MAX_DEPTH, Property};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Identifier immediately followed by ':'
    Key(String),
    Word(String),
    Str(String),
    Number(String),
    Star,
    Comma,
    Open,
    Close,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'|' | b'.' | b'-' | b'+')
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> String {
        format!("line {}: {message}", self.line)
    }

    fn skip_blank(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b';' => {
                    while self.src.get(self.pos).is_some_and(|&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                _ => break,
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, String> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blank();
            let Some(&b) = self.src.get(self.pos) else {
                return Ok(tokens);
            };
            let line = self.line;
            let token = match b {
                b'{' => {
                    self.pos += 1;
                    Token::Open
                }
                b'}' => {
                    self.pos += 1;
                    Token::Close
                }
                b',' => {
                    self.pos += 1;
                    Token::Comma
                }
                b'*' => {
                    self.pos += 1;
                    Token::Star
                }
                b'"' => self.string()?,
                b if is_word_byte(b) => self.word(),
                other => return Err(self.error(format!("unexpected character '{}'", other as char))),
            };
            tokens.push((token, line));
        }
    }

    fn string(&mut self) -> Result<Token, String> {
        let start = self.pos + 1;
        let mut end = start;
        while let Some(&b) = self.src.get(end) {
            if b == b'"' {
                let text = String::from_utf8_lossy(&self.src[start..end]).into_owned();
                self.line += text.matches('\n').count();
                self.pos = end + 1;
                return Ok(Token::Str(text));
            }
            end += 1;
        }
        Err(self.error("unterminated string"))
    }

    fn word(&mut self) -> Token {
        let start = self.pos;
        while self.src.get(self.pos).copied().is_some_and(is_word_byte) {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        if self.src.get(self.pos) == Some(&b':') {
            self.pos += 1;
            return Token::Key(text);
        }
        let first = text.as_bytes()[0];
        if first.is_ascii_digit() || first == b'-' || first == b'+' || first == b'.' {
            Token::Number(text)
        } else {
            Token::Word(text)
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn error(&self, message: impl std::fmt::Display) -> String {
        let line = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map_or(0, |(_, l)| *l);
        format!("line {line}: {message}")
    }

    fn nodes_until_close(&mut self, nested: bool) -> Result<Vec<FbxNode>, String> {
        let mut nodes = Vec::new();
        loop {
            match self.peek() {
                None if nested => return Err(self.error("missing '}'")),
                None => return Ok(nodes),
                Some(Token::Close) if nested => {
                    self.pos += 1;
                    return Ok(nodes);
                }
                Some(Token::Key(_)) => nodes.push(self.node()?),
                Some(other) => {
                    let message = format!("expected a node name, found {other:?}");
                    return Err(self.error(message));
                }
            }
        }
    }

    fn node(&mut self) -> Result<FbxNode, String> {
        let Some(Token::Key(name)) = self.next() else {
            return Err(self.error("expected a node name"));
        };
        let mut node = FbxNode::new(name);
        let mut array_len = None;

        if self.starts_value() {
            loop {
                match self.next() {
                    Some(Token::Number(text)) => node.properties.push(number(&text)),
                    Some(Token::Str(text)) => node.properties.push(Property::String(text)),
                    Some(Token::Word(word)) => node.properties.push(bareword(word)),
                    Some(Token::Star) => match self.next() {
                        Some(Token::Number(n)) => array_len = n.parse::<usize>().ok(),
                        _ => return Err(self.error("expected an array length after '*'")),
                    },
                    _ => return Err(self.error("expected a value")),
                }
                if self.peek() != Some(&Token::Comma) {
                    break;
                }
                self.pos += 1;
            }
        }

        if self.peek() == Some(&Token::Open) {
            if self.depth >= MAX_DEPTH {
                return Err(self.error(format!("nodes nested deeper than {MAX_DEPTH}")));
            }
            self.pos += 1;
            self.depth += 1;
            node.children = self.nodes_until_close(true)?;
            self.depth -= 1;
        }

        if let Some(len) = array_len {
            fold_array(&mut node, len);
        }
        Ok(node)
    }

    fn starts_value(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Number(_) | Token::Str(_) | Token::Word(_) | Token::Star)
        )
    }
}

fn number(text: &str) -> Property {
    if let Ok(i) = text.parse::<i64>() {
        return Property::Int(i);
    }
    match text.parse::<f64>() {
        Ok(f) => Property::Float(f),
        Err(_) => Property::String(text.to_string()),
    }
}

/// `T`/`Y` and `F`/`N` are booleans, anything else stays a string
fn bareword(word: String) -> Property {
    match word.as_str() {
        "T" | "Y" => Property::Bool(true),
        "F" | "N" => Property::Bool(false),
        _ => Property::String(word),
    }
}

/// Move the elements of child `a` into the node's properties as one array
fn fold_array(node: &mut FbxNode, len: usize) {
    let Some(at) = node.children.iter().position(|c| c.name == "a") else {
        node.properties.push(Property::IntArray(Vec::new()));
        return;
    };
    let values = node.children.remove(at).properties;
    if values.len() != len {
        tracing::debug!("{}: array announced {len} elements, found {}", node.name, values.len());
    }
    let property = if values.iter().all(|v| matches!(v, Property::Int(_))) {
        Property::IntArray(values.iter().filter_map(Property::as_i64).collect())
    } else {
        Property::FloatArray(values.iter().filter_map(Property::as_f64).collect())
    };
    node.properties.push(property);
}

/// Whether the bytes look like an ASCII FBX document
pub(super) fn looks_like_ascii(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    text.contains("FBX") || text.trim_start().starts_with("FBXHeaderExtension")
}

/// Parse an ASCII FBX document into a node tree rooted at an unnamed node
pub(super) fn parse(text: &str) -> Result<FbxNode, String> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let children = parser.nodes_until_close(false)?;
    Ok(FbxNode {
        name: String::new(),
        properties: Vec::new(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"; FBX 7.4.0 project file
; ----------------------------------------------------
FBXHeaderExtension:  {
	FBXHeaderVersion: 1003
}
Objects:  {
	Geometry: 1000, "Geometry::Tri", "Mesh" {
		Vertices: *9 {
			a: 0,0,0,1,0,0,0,1.5,-2e-1
		}
		PolygonVertexIndex: *3 {
			a: 0,1,-3
		}
	}
	Model: 2000, "Model::Tri", "Mesh" {
		Shading: T
		Properties70:  {
			P: "Lcl Translation", "Lcl Translation", "", "A",1,2,3
		}
	}
}
Connections:  {
	C: "OO",2000,0
}
"#;

    #[test]
    fn parses_nodes_and_folds_arrays() {
        let root = parse(SAMPLE).unwrap();
        let objects = root.child("Objects").unwrap();
        let geometry = objects.child("Geometry").unwrap();
        assert_eq!(geometry.i64_at(0), Some(1000));
        assert_eq!(geometry.str_at(1), Some("Geometry::Tri"));
        assert_eq!(
            geometry.f64_array("Vertices").unwrap(),
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.5, -0.2]
        );
        assert_eq!(geometry.i64_array("PolygonVertexIndex").unwrap(), vec![0, 1, -3]);

        let model = objects.child("Model").unwrap();
        assert_eq!(model.child("Shading").unwrap().properties, vec![Property::Bool(true)]);
        assert_eq!(model.property70_values("Lcl Translation"), Some(vec![1.0, 2.0, 3.0]));

        let connection = root.child("Connections").unwrap().child("C").unwrap();
        assert_eq!(connection.str_at(0), Some("OO"));
        assert_eq!(connection.i64_at(2), Some(0));
    }

    #[test]
    fn reports_unbalanced_braces() {
        let err = parse("Objects: {\n Model: 1 {\n}\n").unwrap_err();
        assert!(err.contains("missing '}'"), "{err}");
    }

    #[test]
    fn rejects_runaway_nesting() {
        let text = "A: {\n".repeat(100_000);
        let err = parse(&text).unwrap_err();
        assert!(err.contains("nested deeper"), "{err}");
    }

    #[test]
    fn accepts_nesting_at_the_limit() {
        let text = "A: {\n".repeat(MAX_DEPTH) + &"}\n".repeat(MAX_DEPTH);
        let root = parse(&text).unwrap();
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn detects_ascii_header() {
        assert!(looks_like_ascii(SAMPLE.as_bytes()));
        assert!(!looks_like_ascii(b"\x00\x01\x02garbage"));
    }
}

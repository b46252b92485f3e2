use super::error::FilterParseError;

pub struct Lexer {
    input: Vec<char>,
    pub position: usize,
    /// Start of the most recently read token.
    pub token_start: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    Path(String),
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Null,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Not,
    Between,
    In,
    LeftParen,
    RightParen,
    Comma,
    EOF,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => name.clone(),
            Token::Path(path) => format!("`{path}`"),
            Token::String(text) => format!("\"{text}\""),
            Token::Integer(n) => n.to_string(),
            Token::Double(n) => n.to_string(),
            Token::Boolean(b) => b.to_string(),
            Token::Null => "null".to_string(),
            Token::Equal => "=".to_string(),
            Token::NotEqual => "!=".to_string(),
            Token::Less => "<".to_string(),
            Token::LessOrEqual => "<=".to_string(),
            Token::Greater => ">".to_string(),
            Token::GreaterOrEqual => ">=".to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
            Token::Between => "BETWEEN".to_string(),
            Token::In => "IN".to_string(),
            Token::LeftParen => "(".to_string(),
            Token::RightParen => ")".to_string(),
            Token::Comma => ",".to_string(),
            Token::EOF => "end of input".to_string(),
        }
    }
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, FilterParseError> {
        let start = self.position;
        self.advance(); // opening quote
        let mut result = String::new();

        while let Some(ch) = self.current_char() {
            if ch == quote_char {
                self.advance();
                return Ok(result);
            }
            if ch == '\\' {
                self.advance();
                let Some(escaped) = self.current_char() else {
                    return Err(FilterParseError::InvalidEscapeSequence {
                        position: self.position,
                    });
                };
                result.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            } else {
                result.push(ch);
            }
            self.advance();
        }

        Err(FilterParseError::UnterminatedQuote {
            position: start,
            quote_char,
        })
    }

    fn read_bare(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char().filter(|ch| is_bare_token_char(*ch)) {
            result.push(ch);
            self.advance();
        }
        result
    }

    fn single(&mut self, token: Token) -> Result<Token, FilterParseError> {
        self.advance();
        Ok(token)
    }

    /// Consume `next` if it is the current char.
    fn follow(&mut self, next: char) -> bool {
        if self.current_char() == Some(next) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn next_token(&mut self) -> Result<Token, FilterParseError> {
        self.skip_whitespace();
        self.token_start = self.position;

        match self.current_char() {
            None => Ok(Token::EOF),
            Some('(') => self.single(Token::LeftParen),
            Some(')') => self.single(Token::RightParen),
            Some(',') => self.single(Token::Comma),
            Some('=') => {
                self.advance();
                // Accept `==` as a convenience.
                self.follow('=');
                Ok(Token::Equal)
            }
            Some('!') => {
                self.advance();
                if self.follow('=') {
                    Ok(Token::NotEqual)
                } else {
                    Err(FilterParseError::UnexpectedToken {
                        token: "!".to_string(),
                        position: self.token_start,
                    })
                }
            }
            Some('<') => {
                self.advance();
                if self.follow('=') {
                    Ok(Token::LessOrEqual)
                } else if self.follow('>') {
                    Ok(Token::NotEqual)
                } else {
                    Ok(Token::Less)
                }
            }
            Some('>') => {
                self.advance();
                if self.follow('=') {
                    Ok(Token::GreaterOrEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            Some(quote @ ('"' | '\'')) => self.read_string(quote).map(Token::String),
            Some('`') => self.read_string('`').map(Token::Path),
            Some(_) => {
                let token = self.read_bare();
                Ok(classify_bare_token(token))
            }
        }
    }

    pub fn peek_token(&mut self) -> Result<Token, FilterParseError> {
        let saved = (self.position, self.token_start);
        let token = self.next_token();
        (self.position, self.token_start) = saved;
        token
    }
}

fn is_bare_token_char(ch: char) -> bool {
    !ch.is_whitespace()
        && !matches!(
            ch,
            '(' | ')' | ',' | '=' | '!' | '<' | '>' | '"' | '\'' | '`'
        )
}

fn classify_bare_token(token: String) -> Token {
    match token.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "BETWEEN" => Token::Between,
        "IN" => Token::In,
        "TRUE" => Token::Boolean(true),
        "FALSE" => Token::Boolean(false),
        "NULL" => Token::Null,
        _ => parse_numeric_bare_token(&token).unwrap_or(Token::Identifier(token)),
    }
}

fn parse_numeric_bare_token(token: &str) -> Option<Token> {
    if !token.chars().any(|ch| ch.is_ascii_digit())
        || !token
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    if let Ok(integer) = token.parse::<i64>() {
        return Some(Token::Integer(integer));
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .map(Token::Double)
}

use super::ast::{Comparator, FilterExpression, FunctionName, Operand};
use super::error::FilterParseError;
use super::lexer::{Lexer, Token};

type Result<T> = std::result::Result<T, FilterParseError>;

pub fn parse_filter_expression(input: &str) -> Result<FilterExpression> {
    let mut lexer = Lexer::new(input);
    let expr = parse_or_expression(&mut lexer)?;
    match lexer.next_token()? {
        Token::EOF => Ok(expr),
        token => Err(unexpected(&lexer, &token)),
    }
}

/// Parse input consisting of exactly one scalar token.
///
/// Backtick paths are not values and are rejected.
pub fn parse_single_value_token(input: &str) -> Result<Operand> {
    let mut lexer = Lexer::new(input);
    let operand = match lexer.next_token()? {
        Token::Identifier(text) | Token::String(text) => Operand::Value(text),
        Token::Integer(n) => Operand::Integer(n),
        Token::Double(n) => Operand::Double(n),
        Token::Boolean(b) => Operand::Boolean(b),
        Token::Null => Operand::Null,
        token => return Err(unexpected(&lexer, &token)),
    };
    match lexer.next_token()? {
        Token::EOF => Ok(operand),
        token => Err(unexpected(&lexer, &token)),
    }
}

fn unexpected(lexer: &Lexer, token: &Token) -> FilterParseError {
    if *token == Token::EOF {
        return FilterParseError::UnexpectedEndOfInput {
            position: lexer.token_start,
        };
    }
    FilterParseError::UnexpectedToken {
        token: token.describe(),
        position: lexer.token_start,
    }
}

fn expect(lexer: &mut Lexer, expected: &Token) -> Result<()> {
    let token = lexer.next_token()?;
    if token == *expected {
        Ok(())
    } else {
        Err(unexpected(lexer, &token))
    }
}

fn parse_or_expression(lexer: &mut Lexer) -> Result<FilterExpression> {
    let mut expr = parse_and_expression(lexer)?;
    while lexer.peek_token()? == Token::Or {
        lexer.next_token()?;
        let right = parse_and_expression(lexer)?;
        expr = FilterExpression::Or(Box::new(expr), Box::new(right));
    }
    Ok(expr)
}

fn parse_and_expression(lexer: &mut Lexer) -> Result<FilterExpression> {
    let mut expr = parse_not_expression(lexer)?;
    while lexer.peek_token()? == Token::And {
        lexer.next_token()?;
        let right = parse_not_expression(lexer)?;
        expr = FilterExpression::And(Box::new(expr), Box::new(right));
    }
    Ok(expr)
}

fn parse_not_expression(lexer: &mut Lexer) -> Result<FilterExpression> {
    if lexer.peek_token()? == Token::Not {
        lexer.next_token()?;
        let expr = parse_not_expression(lexer)?;
        return Ok(FilterExpression::Not(Box::new(expr)));
    }
    parse_primary_expression(lexer)
}

fn parse_primary_expression(lexer: &mut Lexer) -> Result<FilterExpression> {
    match lexer.peek_token()? {
        Token::LeftParen => {
            lexer.next_token()?;
            let expr = parse_or_expression(lexer)?;
            expect(lexer, &Token::RightParen)?;
            Ok(FilterExpression::Parentheses(Box::new(expr)))
        }
        Token::Identifier(name) => match function_start(lexer, &name)? {
            Some(function) => parse_function(lexer, function),
            None => parse_operand_expression(lexer),
        },
        _ => parse_operand_expression(lexer),
    }
}

// A function name only counts when an opening paren follows, so `type = "x"` stays
// a comparison on a field called `type`.
fn function_start(lexer: &mut Lexer, name: &str) -> Result<Option<FunctionName>> {
    let Some(function) = FunctionName::from_name(name) else {
        return Ok(None);
    };
    let saved = (lexer.position, lexer.token_start);
    lexer.next_token()?;
    let is_call = lexer.peek_token()? == Token::LeftParen;
    (lexer.position, lexer.token_start) = saved;
    Ok(is_call.then_some(function))
}

fn parse_function(lexer: &mut Lexer, name: FunctionName) -> Result<FilterExpression> {
    let name_token = lexer.next_token()?;
    let name_position = lexer.token_start;
    let display_name = name_token.describe();
    expect(lexer, &Token::LeftParen)?;
    let args = parse_operand_list(lexer)?;

    let invalid = |message: &str| FilterParseError::InvalidFunctionArguments {
        name: display_name.clone(),
        message: message.to_string(),
        position: name_position,
    };

    let expected = if name.takes_argument() { 2 } else { 1 };
    if args.len() != expected {
        return Err(invalid(&format!(
            "expected {expected} argument(s), got {}",
            args.len()
        )));
    }
    let mut args = args.into_iter();
    let Some(Operand::Path(path)) = args.next() else {
        return Err(invalid("first argument must be a field path"));
    };
    let argument = args.next();
    match (name, &argument) {
        (FunctionName::BeginsWith | FunctionName::Contains, Some(Operand::Value(_))) => {}
        (FunctionName::BeginsWith | FunctionName::Contains, _) => {
            return Err(invalid("second argument must be a string"));
        }
        (FunctionName::Type, Some(Operand::Value(_) | Operand::Integer(_))) => {}
        (FunctionName::Type, _) => {
            return Err(invalid("second argument must be a type name"));
        }
        _ => {}
    }

    Ok(FilterExpression::Function {
        name,
        path,
        argument,
    })
}

/// Comma-separated operands up to and including the closing paren.
fn parse_operand_list(lexer: &mut Lexer) -> Result<Vec<Operand>> {
    let mut operands = Vec::new();
    if lexer.peek_token()? == Token::RightParen {
        lexer.next_token()?;
        return Ok(operands);
    }
    loop {
        operands.push(parse_operand(lexer, OperandSide::Argument)?);
        match lexer.next_token()? {
            Token::Comma => {}
            Token::RightParen => return Ok(operands),
            token => return Err(unexpected(lexer, &token)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OperandSide {
    /// Left of an operator: bare words are field paths.
    Left,
    /// Right of an operator or inside a list: bare words are string values.
    Argument,
}

fn parse_operand(lexer: &mut Lexer, side: OperandSide) -> Result<Operand> {
    let token = lexer.next_token()?;
    let operand = match token {
        Token::Identifier(name) if side == OperandSide::Left => Operand::Path(name),
        Token::Identifier(name) => Operand::Value(name),
        Token::Path(path) => Operand::Path(path),
        Token::String(text) => Operand::Value(text),
        Token::Integer(n) => Operand::Integer(n),
        Token::Double(n) => Operand::Double(n),
        Token::Boolean(b) => Operand::Boolean(b),
        Token::Null => Operand::Null,
        token => return Err(unexpected(lexer, &token)),
    };
    Ok(operand)
}

fn comparator(token: &Token) -> Option<Comparator> {
    match token {
        Token::Equal => Some(Comparator::Equal),
        Token::NotEqual => Some(Comparator::NotEqual),
        Token::Less => Some(Comparator::Less),
        Token::LessOrEqual => Some(Comparator::LessOrEqual),
        Token::Greater => Some(Comparator::Greater),
        Token::GreaterOrEqual => Some(Comparator::GreaterOrEqual),
        _ => None,
    }
}

fn parse_operand_expression(lexer: &mut Lexer) -> Result<FilterExpression> {
    let left = parse_operand(lexer, OperandSide::Left)?;
    let left_position = lexer.token_start;
    let next = lexer.peek_token()?;

    if let Some(operator) = comparator(&next) {
        lexer.next_token()?;
        let right = parse_operand(lexer, OperandSide::Argument)?;
        if !left.is_path() && !right.is_path() {
            return Err(FilterParseError::InvalidSyntax {
                message: "comparison needs at least one field path".to_string(),
                position: left_position,
            });
        }
        return Ok(FilterExpression::Comparison {
            left,
            operator,
            right,
        });
    }

    let path = match (&next, left) {
        (Token::Between | Token::In, Operand::Path(path)) => path,
        (Token::Between | Token::In, _) => {
            return Err(FilterParseError::InvalidSyntax {
                message: format!("{} needs a field path on the left", next.describe()),
                position: left_position,
            });
        }
        _ => {
            return Err(FilterParseError::InvalidSyntax {
                message: "Expected comparison operator, BETWEEN, or IN".to_string(),
                position: lexer.position,
            });
        }
    };

    lexer.next_token()?;
    if next == Token::Between {
        let lower = parse_operand(lexer, OperandSide::Argument)?;
        expect(lexer, &Token::And)?;
        let upper = parse_operand(lexer, OperandSide::Argument)?;
        return Ok(FilterExpression::Between { path, lower, upper });
    }

    expect(lexer, &Token::LeftParen)?;
    let values = parse_operand_list(lexer)?;
    if values.is_empty() {
        return Err(FilterParseError::InvalidSyntax {
            message: "IN needs at least one value".to_string(),
            position: lexer.token_start,
        });
    }
    Ok(FilterExpression::In { path, values })
}

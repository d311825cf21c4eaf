// ABOUTME: Infix numeric/boolean expression evaluator used by the numeric built-ins

use crate::config::N_PAIRS;
use crate::error::EngineError;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::digit1;
use nom::combinator::{map_res, value};
use nom::{IResult, Parser};

/// Expression tokens. Keywords are case-insensitive; numbers are unsigned
/// decimal literals (negation is a unary operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Number(i64),
    LeftParen,
    RightParen,
    End,
    Or,
    And,
    Not,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    Plus,
    Minus,
    Times,
    Div,
    Mod,
}

/// Binary precedence levels, lowest first. Closing tokens rank below every
/// operator so they fold the whole pending expression.
fn prec(t: Token) -> u8 {
    match t {
        Token::Or => 1,
        Token::And => 2,
        Token::Gt | Token::Lt | Token::Ge | Token::Le | Token::Eq | Token::Ne => 3,
        Token::Plus | Token::Minus => 4,
        Token::Times | Token::Div | Token::Mod => 5,
        _ => 0,
    }
}

fn operator(input: &[u8]) -> IResult<&[u8], Token> {
    alt((
        map_res(digit1, |digits: &[u8]| {
            // digit1 guarantees ASCII digits; overflow of i64 is a lex failure
            std::str::from_utf8(digits)
                .map_err(|_| ())
                .and_then(|s| s.parse::<i64>().map_err(|_| ()))
                .map(Token::Number)
        }),
        value(Token::Ge, tag(&b">="[..])),
        value(Token::Le, tag(&b"<="[..])),
        value(Token::Ne, tag(&b"<>"[..])),
        value(Token::Gt, tag(&b">"[..])),
        value(Token::Lt, tag(&b"<"[..])),
        value(Token::Eq, tag(&b"="[..])),
        value(Token::Plus, tag(&b"+"[..])),
        value(Token::Minus, tag(&b"-"[..])),
        value(Token::Times, tag(&b"*"[..])),
        value(Token::Div, tag(&b"/"[..])),
        value(Token::LeftParen, tag(&b"("[..])),
        value(Token::RightParen, tag(&b")"[..])),
        value(Token::Or, tag_no_case(&b"or"[..])),
        value(Token::And, tag_no_case(&b"and"[..])),
        value(Token::Not, tag_no_case(&b"not"[..])),
        value(Token::Mod, tag_no_case(&b"mod"[..])),
    ))
    .parse(input)
}

/// Pull the next token off the input, skipping space, tab and newline.
fn lex(input: &[u8]) -> Result<(Token, &[u8]), EngineError> {
    let mut rest = input;
    while let Some((&c, tail)) = rest.split_first() {
        if c == b' ' || c == b'\t' || c == b'\n' {
            rest = tail;
        } else {
            break;
        }
    }
    if rest.is_empty() {
        return Ok((Token::End, rest));
    }
    match operator(rest) {
        Ok((rest, tok)) => Ok((tok, rest)),
        Err(_) => Err(EngineError::ExprSyntax),
    }
}

/// The six distinct operations an arbitrary run of unary `-` and `not`
/// collapses to. Later tokens in the run sit closer to the operand, so
/// composing token T onto accumulated op F yields F after T.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unary {
    Identity,
    Not,
    Negate,
    /// 0 -> -1, nonzero -> 0
    NegateNot,
    /// nonzero -> 1
    ToBool,
    /// nonzero -> -1
    NegateToBool,
}

impl Unary {
    fn then_not(self) -> Self {
        match self {
            Unary::Identity => Unary::Not,
            Unary::Not => Unary::ToBool,
            Unary::Negate => Unary::NegateNot,
            Unary::NegateNot => Unary::NegateToBool,
            Unary::ToBool => Unary::Not,
            Unary::NegateToBool => Unary::NegateNot,
        }
    }

    fn then_negate(self) -> Self {
        match self {
            Unary::Identity => Unary::Negate,
            Unary::Not => Unary::Not,
            Unary::Negate => Unary::Identity,
            Unary::NegateNot => Unary::NegateNot,
            Unary::ToBool => Unary::ToBool,
            Unary::NegateToBool => Unary::NegateToBool,
        }
    }

    fn apply(self, n: i64) -> i64 {
        match self {
            Unary::Identity => n,
            Unary::Not => (n == 0) as i64,
            Unary::Negate => n.wrapping_neg(),
            Unary::NegateNot => {
                if n != 0 {
                    0
                } else {
                    -1
                }
            }
            Unary::ToBool => (n != 0) as i64,
            Unary::NegateToBool => {
                if n != 0 {
                    -1
                } else {
                    0
                }
            }
        }
    }
}

/// Booleans materialize as 1/0; division and remainder truncate toward zero
/// with the remainder taking the dividend's sign; arithmetic wraps.
fn apply_binary(op: Token, lhs: i64, rhs: i64) -> Result<i64, EngineError> {
    match op {
        Token::Or => Ok((lhs != 0 || rhs != 0) as i64),
        Token::And => Ok((lhs != 0 && rhs != 0) as i64),
        Token::Gt => Ok((lhs > rhs) as i64),
        Token::Lt => Ok((lhs < rhs) as i64),
        Token::Ge => Ok((lhs >= rhs) as i64),
        Token::Le => Ok((lhs <= rhs) as i64),
        Token::Eq => Ok((lhs == rhs) as i64),
        Token::Ne => Ok((lhs != rhs) as i64),
        Token::Plus => Ok(lhs.wrapping_add(rhs)),
        Token::Minus => Ok(lhs.wrapping_sub(rhs)),
        Token::Times => Ok(lhs.wrapping_mul(rhs)),
        Token::Div => {
            if rhs == 0 {
                Err(EngineError::DivisionByZero)
            } else {
                Ok(lhs.wrapping_div(rhs))
            }
        }
        Token::Mod => {
            if rhs == 0 {
                Err(EngineError::DivisionByZero)
            } else {
                Ok(lhs.wrapping_rem(rhs))
            }
        }
        _ => Err(EngineError::ExprSyntax),
    }
}

/// Precedence-climbing state: a cursor over the input plus the pair budget
/// and parenthesis depth shared across nested sub-expressions.
struct Evaluator<'a> {
    rest: &'a [u8],
    pairs_in_use: usize,
    paren_depth: usize,
}

impl<'a> Evaluator<'a> {
    fn next_token(&mut self) -> Result<Token, EngineError> {
        let (tok, rest) = lex(self.rest)?;
        self.rest = rest;
        Ok(tok)
    }

    /// Read one `(operand, trailing operator)` pair: a run of unary
    /// operators, then a number or a parenthesized sub-expression, then the
    /// binary operator (or closing token) that follows it.
    fn next_pair(&mut self) -> Result<(i64, Token), EngineError> {
        if self.pairs_in_use == N_PAIRS {
            return Err(EngineError::ExprPairOverflow);
        }
        self.pairs_in_use += 1;

        let mut unary = Unary::Identity;
        let operand = loop {
            match self.next_token()? {
                Token::Number(n) => break n,
                Token::LeftParen => {
                    self.paren_depth += 1;
                    break self.eval_expr()?;
                }
                Token::Not => unary = unary.then_not(),
                Token::Minus => unary = unary.then_negate(),
                // unary plus is a no-op
                Token::Plus => {}
                _ => return Err(EngineError::ExprSyntax),
            }
        };
        let operand = unary.apply(operand);

        let op = self.next_token()?;
        match op {
            Token::Number(_) | Token::LeftParen | Token::Not => Err(EngineError::ExprSyntax),
            _ => Ok((operand, op)),
        }
    }

    /// Evaluate up to a closing parenthesis or the end of the string.
    ///
    /// Pairs stack up while each new trailing operator binds tighter than
    /// the one before it; as soon as it does not, the earlier pair is folded
    /// by applying its operator to the two adjacent operands. Closing tokens
    /// rank below every operator, so they collapse the whole stack.
    fn eval_expr(&mut self) -> Result<i64, EngineError> {
        let mut pairs: Vec<(i64, Token)> = Vec::new();
        loop {
            pairs.push(self.next_pair()?);

            while pairs.len() >= 2 {
                let (new_num, new_op) = pairs[pairs.len() - 1];
                let (prev_num, prev_op) = pairs[pairs.len() - 2];
                if prec(new_op) > prec(prev_op) {
                    break;
                }
                let folded = apply_binary(prev_op, prev_num, new_num)?;
                pairs.pop();
                self.pairs_in_use -= 1;
                let len = pairs.len();
                pairs[len - 1] = (folded, new_op);
            }

            if pairs.len() == 1 {
                let (num, op) = pairs[0];
                if op == Token::RightParen || op == Token::End {
                    if op == Token::End && self.paren_depth != 0 {
                        return Err(EngineError::MissingRightParen);
                    }
                    if op == Token::RightParen {
                        if self.paren_depth == 0 {
                            return Err(EngineError::ExtraRightParen);
                        }
                        self.paren_depth -= 1;
                    }
                    self.pairs_in_use -= 1;
                    return Ok(num);
                }
            }
        }
    }
}

/// Parse and evaluate an expression given as a byte string.
pub fn calc(expr: &[u8]) -> Result<i64, EngineError> {
    let mut evaluator = Evaluator {
        rest: expr,
        pairs_in_use: 0,
        paren_depth: 0,
    };
    let result = evaluator.eval_expr()?;
    match evaluator.next_token() {
        Ok(Token::End) => Ok(result),
        _ => Err(EngineError::JunkAfterExpression),
    }
}

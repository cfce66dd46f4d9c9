//! Text scripts
//!
//! A line-oriented rendition of the block editor's programs:
//!
//! ```text
//! # drive out, say hello, come back
//! move forward 10
//! speak "hi there"
//! turn left 180
//! wait 0.5
//! servo G 50
//! audio Wall-E_1
//! stop
//! ```
//!
//! Each statement gets the id `line-<n>`.

use super::{MoveDirection, Program, Statement, StatementKind, TurnDirection};
use crate::util::span::Position;
use thiserror::Error;

/// Script parse error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{at}: unterminated string")]
    UnterminatedString { at: Position },

    #[error("{at}: invalid escape sequence `\\{ch}`")]
    InvalidEscape { at: Position, ch: char },

    #[error("{at}: unknown statement `{keyword}`")]
    UnknownStatement { at: Position, keyword: String },

    #[error("{at}: `{statement}` expects {argument}")]
    MissingArgument {
        at: Position,
        statement: &'static str,
        argument: &'static str,
    },

    #[error("{at}: `{text}` is not a number")]
    InvalidNumber { at: Position, text: String },

    #[error("{at}: `{text}` is not a direction (expected {expected})")]
    InvalidDirection {
        at: Position,
        text: String,
        expected: &'static str,
    },

    #[error("{at}: unexpected `{text}`")]
    TrailingInput { at: Position, text: String },
}

/// A word of a script line.
#[derive(Debug, Clone, PartialEq)]
struct Word {
    text: String,
    quoted: bool,
    at: Position,
}

/// Parse a text script into a program.
///
/// The result is not validated; an empty script yields an empty program.
pub fn parse_script(source: &str) -> Result<Program, ParseError> {
    let mut statements = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let words = split_line(line, line_no)?;
        let Some((head, args)) = words.split_first() else {
            continue;
        };
        let kind = parse_statement(head, args, line_no, line)?;
        statements.push(Statement::new(format!("line-{}", line_no), kind));
    }

    Ok(Program::new(statements))
}

fn parse_statement(
    head: &Word,
    args: &[Word],
    line_no: usize,
    line: &str,
) -> Result<StatementKind, ParseError> {
    let mut args = Args {
        words: args,
        pos: 0,
        end: Position::new(line_no, line.chars().count() + 1),
    };

    let keyword = head.text.to_ascii_lowercase();
    let kind = match keyword.as_str() {
        "move" => {
            let word = args.next("move", "a direction")?;
            let direction = move_direction(word)?;
            let distance = args.number("move", "a distance")?;
            StatementKind::Move {
                direction,
                distance,
            }
        }
        "turn" => {
            let word = args.next("turn", "a direction")?;
            let direction = turn_direction(word)?;
            let degrees = match args.peek() {
                Some(_) => args.number("turn", "degrees")?,
                None => 90.0,
            };
            StatementKind::Turn { direction, degrees }
        }
        "wait" => StatementKind::Wait {
            seconds: args.number("wait", "seconds")?,
        },
        "speak" => {
            let text = args.rest().join(" ");
            StatementKind::Speak { text }
        }
        "servo" => {
            let servo = args.next("servo", "a servo id")?.text.clone();
            let value = args.number("servo", "a value")?;
            StatementKind::Servo { servo, value }
        }
        "audio" => StatementKind::Audio {
            clip: args.next("audio", "a clip name")?.text.clone(),
        },
        "stop" => StatementKind::Stop,
        _ => {
            return Err(ParseError::UnknownStatement {
                at: head.at,
                keyword: head.text.clone(),
            })
        }
    };

    args.finish()?;
    Ok(kind)
}

struct Args<'a> {
    words: &'a [Word],
    pos: usize,
    end: Position,
}

impl<'a> Args<'a> {
    fn peek(&self) -> Option<&'a Word> {
        self.words.get(self.pos)
    }

    fn next(
        &mut self,
        statement: &'static str,
        argument: &'static str,
    ) -> Result<&'a Word, ParseError> {
        let word = self.peek().ok_or(ParseError::MissingArgument {
            at: self.end,
            statement,
            argument,
        })?;
        self.pos += 1;
        Ok(word)
    }

    fn number(
        &mut self,
        statement: &'static str,
        argument: &'static str,
    ) -> Result<f64, ParseError> {
        let word = self.next(statement, argument)?;
        word.text
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber {
                at: word.at,
                text: word.text.clone(),
            })
    }

    fn rest(&mut self) -> Vec<&'a str> {
        let rest = self.words[self.pos..]
            .iter()
            .map(|w| w.text.as_str())
            .collect();
        self.pos = self.words.len();
        rest
    }

    fn finish(&self) -> Result<(), ParseError> {
        match self.peek() {
            Some(word) => Err(ParseError::TrailingInput {
                at: word.at,
                text: word.text.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn move_direction(word: &Word) -> Result<MoveDirection, ParseError> {
    match word.text.to_ascii_lowercase().as_str() {
        "forward" | "w" => Ok(MoveDirection::Forward),
        "backward" | "s" => Ok(MoveDirection::Backward),
        _ => Err(ParseError::InvalidDirection {
            at: word.at,
            text: word.text.clone(),
            expected: "forward or backward",
        }),
    }
}

fn turn_direction(word: &Word) -> Result<TurnDirection, ParseError> {
    match word.text.to_ascii_lowercase().as_str() {
        "left" | "a" => Ok(TurnDirection::Left),
        "right" | "d" => Ok(TurnDirection::Right),
        _ => Err(ParseError::InvalidDirection {
            at: word.at,
            text: word.text.clone(),
            expected: "left or right",
        }),
    }
}

/// Split one line into words, honouring `"..."` quoting and `#` comments.
fn split_line(
    line: &str,
    line_no: usize,
) -> Result<Vec<Word>, ParseError> {
    let mut words = Vec::new();
    let mut chars = line.chars().enumerate().peekable();

    while let Some(&(col, c)) = chars.peek() {
        let at = Position::new(line_no, col + 1);
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => break,
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((esc_col, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, '"')) => text.push('"'),
                            Some((_, '\\')) => text.push('\\'),
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, other)) => {
                                return Err(ParseError::InvalidEscape {
                                    at: Position::new(line_no, esc_col + 1),
                                    ch: other,
                                })
                            }
                            None => break,
                        },
                        c => text.push(c),
                    }
                }
                if !closed {
                    return Err(ParseError::UnterminatedString { at });
                }
                words.push(Word {
                    text,
                    quoted: true,
                    at,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '"' || c == '#' {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                words.push(Word {
                    text,
                    quoted: false,
                    at,
                });
            }
        }
    }

    // A quoted first word is never a keyword.
    if let Some(first) = words.first() {
        if first.quoted {
            return Err(ParseError::UnknownStatement {
                at: first.at,
                keyword: first.text.clone(),
            });
        }
    }

    Ok(words)
}

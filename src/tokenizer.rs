use crate::error::{Error, Result};

/// Represents the smallest meaningful units (atoms) of the statement
/// language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- Keywords ---
    Create,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Update,
    Set,
    Delete,
    Alter,
    Rename,
    To,
    Add,
    Column,

    // --- Data Types ---
    Int,
    Str,
    Date,

    // --- Identifiers & Literals ---
    /// A name representing a table or a column (e.g., `users`, `id`).
    Ident(String),
    /// A 64-bit integer literal (e.g., `42`). Carries no sign; a negative
    /// number must be quoted to reach the literal classifier.
    Number(i64),
    /// A string literal, between single or double quotes.
    String(String),

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Equal sign `=`
    Equal,

    // --- Special ---
    /// Represents the End Of Input.
    Eof,
}

/// A token plus the character offset where it starts, so parse errors can
/// point at the offending input.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// A lexical scanner that converts a raw statement string into a sequence
/// of [Spanned] tokens.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of spanned tokens,
    /// always terminated by [Token::Eof].
    ///
    /// # Errors
    /// Returns [Error::Syntax] if an unsupported character is encountered
    /// or a literal is malformed.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            let offset = self.position;
            let token = self.next_token()?;
            tokens.push(Spanned { token, offset });
        }

        tokens.push(Spanned {
            token: Token::Eof,
            offset: self.position,
        });
        Ok(tokens)
    }

    /// Identifies the next token based on the character at the current
    /// position.
    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            '=' => {
                self.advance();
                Ok(Token::Equal)
            }
            c if c.is_alphabetic() => self.read_identifier(),
            c if c.is_ascii_digit() => self.read_number(),
            '\'' | '"' => self.read_string(ch),
            _ => Err(Error::Syntax {
                position: self.position,
                message: format!("character {ch:?} is not supported"),
            }),
        }
    }

    // --- Navigation Helpers ---

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads a sequence of alphanumeric characters and determines if it's
    /// a reserved keyword or a user-defined identifier.
    ///
    /// Keywords are matched case-insensitively.
    fn read_identifier(&mut self) -> Result<Token> {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "CREATE" => Ok(Token::Create),
            "TABLE" => Ok(Token::Table),
            "INSERT" => Ok(Token::Insert),
            "INTO" => Ok(Token::Into),
            "VALUES" => Ok(Token::Values),
            "SELECT" => Ok(Token::Select),
            "FROM" => Ok(Token::From),
            "WHERE" => Ok(Token::Where),
            "UPDATE" => Ok(Token::Update),
            "SET" => Ok(Token::Set),
            "DELETE" => Ok(Token::Delete),
            "ALTER" => Ok(Token::Alter),
            "RENAME" => Ok(Token::Rename),
            "TO" => Ok(Token::To),
            "ADD" => Ok(Token::Add),
            "COLUMN" => Ok(Token::Column),
            "INT" => Ok(Token::Int),
            "STR" => Ok(Token::Str),
            "DATE" => Ok(Token::Date),
            _ => Ok(Token::Ident(ident)),
        }
    }

    /// Reads an unsigned integer literal.
    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut number = String::new();

        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            number.push(self.current_char());
            self.advance();
        }

        number.parse::<i64>().map(Token::Number).map_err(|_| Error::Syntax {
            position: start,
            message: format!("integer literal {number} out of range"),
        })
    }

    /// Reads a string literal enclosed in the given quote character.
    fn read_string(&mut self, quote: char) -> Result<Token> {
        let start = self.position;
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        while !self.is_at_end() && self.current_char() != quote {
            string.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(Error::Syntax {
                position: start,
                message: "unterminated string literal".into(),
            });
        }

        // Skip the closing quote
        self.advance();

        Ok(Token::String(string))
    }
}

use crate::ast::*;
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::table::ColumnDef;
use crate::tokenizer::{Spanned, Token};

/// Recursive-descent parser over the token stream produced by
/// [crate::tokenizer::Tokenizer]. One statement per input; anything left
/// over after a full parse is a syntax error.
pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Create => self.parse_create_table(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Alter => self.parse_alter(),
            _ => Err(self.unexpected("a statement keyword")),
        }?;

        // Check we are at the end of the statement
        if !self.is_at_end() {
            return Err(self.unexpected("end of statement"));
        }

        Ok(statement)
    }

    // helpers

    fn current(&self) -> &Spanned {
        &self.tokens[self.position]
    }

    fn current_token(&self) -> &Token {
        &self.current().token
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::Syntax {
            position: self.current().offset,
            message: format!("expected {}, found {:?}", expected, self.current_token()),
        }
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{expected:?}")))
        }
    }

    fn consume_ident(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn consume_data_type(&mut self) -> Result<DataType> {
        let data_type = match self.current_token() {
            Token::Int => DataType::Int,
            Token::Str => DataType::Str,
            Token::Date => DataType::Date,
            _ => return Err(self.unexpected("a column type (INT, STR or DATE)")),
        };
        self.advance();
        Ok(data_type)
    }

    fn consume_literal(&mut self) -> Result<Literal> {
        let literal = match self.current_token() {
            Token::Number(n) => Literal::Number(*n),
            Token::String(s) => Literal::Quoted(s.clone()),
            _ => return Err(self.unexpected("a literal value")),
        };
        self.advance();
        Ok(literal)
    }

    /// `ident (',' ident)*`
    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        let mut idents = vec![self.consume_ident()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            idents.push(self.consume_ident()?);
        }
        Ok(idents)
    }

    /// `value (',' value)*`
    fn parse_literal_list(&mut self) -> Result<Vec<Literal>> {
        let mut literals = vec![self.consume_literal()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            literals.push(self.consume_literal()?);
        }
        Ok(literals)
    }

    /// `ident '=' value (',' ident '=' value)*`
    fn parse_pair_list(&mut self) -> Result<Vec<(String, Literal)>> {
        let mut pairs = vec![self.parse_pair()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            pairs.push(self.parse_pair()?);
        }
        Ok(pairs)
    }

    fn parse_pair(&mut self) -> Result<(String, Literal)> {
        let column = self.consume_ident()?;
        self.consume(Token::Equal)?;
        let value = self.consume_literal()?;
        Ok((column, value))
    }

    /// `(WHERE predicate)?` — empty when absent.
    fn parse_optional_where(&mut self) -> Result<Predicate> {
        if matches!(self.current_token(), Token::Where) {
            self.advance();
            self.parse_pair_list()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.consume_ident()?;
        let data_type = self.consume_data_type()?;
        Ok(ColumnDef { name, data_type })
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.consume(Token::Create)?;
        self.consume(Token::Table)?;
        let table = self.consume_ident()?;
        self.consume(Token::LeftParen)?;
        let mut columns = vec![self.parse_column_def()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            columns.push(self.parse_column_def()?);
        }
        self.consume(Token::RightParen)?;
        Ok(Statement::CreateTable(CreateTable { table, columns }))
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.consume_ident()?;
        self.consume(Token::LeftParen)?;
        let columns = self.parse_ident_list()?;
        self.consume(Token::RightParen)?;
        self.consume(Token::Values)?;
        self.consume(Token::LeftParen)?;
        let values = self.parse_literal_list()?;
        self.consume(Token::RightParen)?;
        Ok(Statement::Insert(Insert {
            table,
            columns,
            values,
        }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(Token::Select)?;
        let columns = self.parse_ident_list()?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;
        let filters = self.parse_optional_where()?;
        Ok(Statement::Select(Select {
            table,
            columns,
            filters,
        }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(Token::Update)?;
        let table = self.consume_ident()?;
        self.consume(Token::Set)?;
        let assignments = self.parse_pair_list()?;
        let filters = self.parse_optional_where()?;
        Ok(Statement::Update(Update {
            table,
            assignments,
            filters,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;
        let filters = self.parse_optional_where()?;
        Ok(Statement::Delete(Delete { table, filters }))
    }

    /// `ALTER TABLE ident (RENAME TO ident | ADD COLUMN ident type)`
    fn parse_alter(&mut self) -> Result<Statement> {
        self.consume(Token::Alter)?;
        self.consume(Token::Table)?;
        let table = self.consume_ident()?;
        match self.current_token() {
            Token::Rename => {
                self.advance();
                self.consume(Token::To)?;
                let new_name = self.consume_ident()?;
                Ok(Statement::RenameTable(RenameTable { table, new_name }))
            }
            Token::Add => {
                self.advance();
                self.consume(Token::Column)?;
                let column = self.consume_ident()?;
                let data_type = self.consume_data_type()?;
                Ok(Statement::AddColumn(AddColumn {
                    table,
                    column,
                    data_type,
                }))
            }
            _ => Err(self.unexpected("RENAME or ADD")),
        }
    }
}

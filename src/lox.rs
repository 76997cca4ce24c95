//! Top-level pipeline: scan → parse → resolve → interpret.
//!
//! A [`Lox`] value is one interpreter session.  Successive [`Lox::run`] calls
//! share the globals environment, which is what gives an interactive host its
//! cross-line definitions; a file host calls `run` once and inspects the
//! error flags for its exit code.

use std::io::Write;

use log::{debug, info};

use crate::error::ErrorReporter;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::token::Token;

pub struct Lox<W: Write> {
    interpreter: Interpreter<W>,
    reporter: ErrorReporter,
    next_expr_id: u32,
}

impl<W: Write> Lox<W> {
    /// `output` receives everything `print` writes.
    pub fn new(output: W) -> Self {
        Lox {
            interpreter: Interpreter::new(output),
            reporter: ErrorReporter::new(),
            next_expr_id: 0,
        }
    }

    /// Runs one source buffer to completion.  Diagnostics go through the
    /// sink; a program with syntax or static errors is never executed.
    pub fn run(&mut self, source: &[u8]) {
        info!("Running {} bytes of source", source.len());

        // 1. Scan, reporting lexical errors in-stream.
        let mut tokens: Vec<Token> = Vec::new();

        for result in Scanner::new(source) {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => self.reporter.report(&e),
            }
        }

        // 2. Parse.  Expression ids continue across runs so the locals
        //    table never aliases nodes from earlier inputs.
        let mut parser = Parser::new(tokens, self.next_expr_id, &mut self.reporter);
        let statements: Vec<Stmt> = parser.parse();
        self.next_expr_id = parser.next_id();

        if self.reporter.had_error() {
            debug!("Skipping execution: syntax errors");
            return;
        }

        // 3. Resolve binding distances and static rules.
        Resolver::new(&mut self.interpreter, &mut self.reporter).resolve(&statements);

        if self.reporter.had_error() {
            debug!("Skipping execution: static errors");
            return;
        }

        // 4. Execute.
        if let Err(e) = self.interpreter.interpret(&statements) {
            self.reporter.report(&e);
        }
    }

    #[inline]
    pub fn had_error(&self) -> bool {
        self.reporter.had_error()
    }

    #[inline]
    pub fn had_runtime_error(&self) -> bool {
        self.reporter.had_runtime_error()
    }

    /// Clears both error flags.  Interactive hosts call this at each prompt.
    pub fn reset_errors(&mut self) {
        self.reporter.reset();
    }

    /// Consumes the session and hands back the output writer.
    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }
}

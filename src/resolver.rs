//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String, bool>`
//!    tracking declared (false) and fully defined (true) names in each nested
//!    block or function.
//! 2. **Enforce static rules**: reports errors such as redeclaration in the
//!    same scope, reading a variable in its own initializer, invalid `return`
//!    outside functions, and illegal use of `this`/`super`.
//! 3. **Record binding distances**: for every name-using expression
//!    (`Variable`, `Assign`, `This`, `Super`), calls back into the
//!    interpreter to note its depth when it is a local.  Names bound by no
//!    scope stay unresolved and fall back to globals at runtime.  This
//!    enables the runtime to climb exactly the right number of environment
//!    frames.
//!
//! Every static error goes through the shared [`ErrorReporter`]; resolution
//! always finishes the walk, so a single pass diagnoses every static error
//! in the program.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{ErrorReporter, LoxError};
use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// What kind of function body are we inside?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'i, W: Write> {
    interpreter: &'i mut Interpreter<W>,
    reporter: &'i mut ErrorReporter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'i, W: Write> Resolver<'i, W> {
    /// Create a new resolver bound to the given interpreter and sink.
    pub fn new(interpreter: &'i mut Interpreter<W>, reporter: &'i mut ErrorReporter) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Block(statements) => {
                // 1. Push a new anonymous scope for `{ … }`
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                // 2. Pop the block scope
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // 1. Declare the variable name (present but not yet defined)
                self.declare(name);

                // 2. Resolve the initializer expression, if any
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                // 3. Define the variable so it's readable in this scope
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // 1. Declare and define the function name up front so the
                //    body can recurse.
                self.declare(&declaration.name);
                self.define(&declaration.name);

                self.resolve_function(FunctionType::Function, declaration);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                // 1. Ensure we're inside a function body at all.
                if self.current_function == FunctionType::None {
                    self.report(LoxError::resolve_at(
                        keyword,
                        "Can't return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    // 2. In an initializer, only a bare `return;` is allowed.
                    if self.current_function == FunctionType::Initializer {
                        self.report(LoxError::resolve_at(
                            keyword,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(&mut self, name: &Token, superclass: Option<&Expr>, methods: &[Rc<FunctionDecl>]) {
        // 1. Save and enter the class context.
        let enclosing_class: ClassType = self.current_class;

        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        // 2. Declare & define the class name so methods can refer to it.
        self.declare(name);
        self.define(name);

        // 3. Self‑inheritance guard, then resolve the superclass name and
        //    open a scope binding `super`.
        if let Some(expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = expr
            {
                if super_name.lexeme == name.lexeme {
                    self.report(LoxError::resolve_at(
                        super_name,
                        "A class can't inherit from itself.",
                    ));
                }
            }

            self.resolve_expr(expr);

            self.begin_scope();
            self.scopes
                .last_mut()
                .expect("scope just pushed")
                .insert("super".to_string(), true);
        }

        // 4. Open the implicit `this` scope for methods.
        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("scope just pushed")
            .insert("this".to_string(), true);

        // 5. Resolve each method in its own function context.
        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(kind, method);
        }

        // 6. Close the `this` scope, then the `super` scope if opened.
        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        // 7. Restore the outer class context.
        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        debug!("Resolving expr: {:?}", expr);

        match expr {
            Expr::Literal(_) => {
                // Literals have no sub‑expressions.
            }

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // 1. Prevent reading a variable in its own initializer.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.report(LoxError::resolve_at(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                // 2. Bind this occurrence at its lexical depth.
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // Resolve the right‑hand side first, then bind the target.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => {
                // Property names are looked up dynamically; only the object
                // expression resolves statically.
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.report(LoxError::resolve_at(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                // 1. Disallow outside any class.
                if self.current_class == ClassType::None {
                    self.report(LoxError::resolve_at(
                        keyword,
                        "Can't use 'super' outside of a class.",
                    ));
                    return;
                }

                // 2. Disallow in a class with no superclass.
                if self.current_class != ClassType::Subclass {
                    self.report(LoxError::resolve_at(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                    return;
                }

                // 3. Valid: bind `super` like a local variable.
                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods, and initializers.
    fn resolve_function(&mut self, kind: FunctionType, declaration: &FunctionDecl) {
        // 1. Save the enclosing function context so we can restore it later.
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        // 2. Begin a new lexical scope for the parameters & body.
        self.begin_scope();

        // 3. Declare and immediately define each parameter.
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }

        // 4. Resolve the body under the current context.
        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }

        // 5. Pop the parameter/body scope and restore the outer context.
        self.end_scope();
        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        // 1. In a local scope, a name may only be declared once.
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                let err =
                    LoxError::resolve_at(name, "Already a variable with this name in this scope.");
                self.reporter.report(&err);
                return;
            }

            // 2. Mark the name as declared but not yet defined.
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        // Mark the name as fully defined in the current scope.
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn report(&mut self, error: LoxError) {
        self.reporter.report(&error);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d` when some scope binds
    /// the name; otherwise leave it for the globals at runtime.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        // Search each scope from innermost outward.
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve_into(
        source: &str,
        interpreter: &mut Interpreter<Vec<u8>>,
        reporter: &mut ErrorReporter,
    ) -> (Vec<Stmt>, u32) {
        let tokens: Vec<_> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();
        let mut parser = Parser::new(tokens, 0, reporter);
        let program = parser.parse();
        let id_count = parser.next_id();

        Resolver::new(interpreter, reporter).resolve(&program);

        (program, id_count)
    }

    #[test]
    fn resolving_the_same_ast_twice_records_identical_depths() {
        let source = "{ var a = 1; { fun f() { print a; } f(); } }";

        let mut reporter = ErrorReporter::new();
        let mut interpreter: Interpreter<Vec<u8>> = Interpreter::new(Vec::new());

        let (program, id_count) = resolve_into(source, &mut interpreter, &mut reporter);
        assert!(!reporter.had_error());

        let first: Vec<Option<usize>> = (0..id_count)
            .map(|i| interpreter.local_depth(ExprId(i)))
            .collect();

        Resolver::new(&mut interpreter, &mut reporter).resolve(&program);

        let second: Vec<Option<usize>> = (0..id_count)
            .map(|i| interpreter.local_depth(ExprId(i)))
            .collect();

        assert_eq!(first, second);
        assert!(
            first.iter().any(|depth| depth.is_some()),
            "the closure read of 'a' should resolve to a local depth"
        );
    }

    #[test]
    fn unbound_names_are_left_for_the_globals() {
        let source = "print unknown;";

        let mut reporter = ErrorReporter::new();
        let mut interpreter: Interpreter<Vec<u8>> = Interpreter::new(Vec::new());

        let (_program, id_count) = resolve_into(source, &mut interpreter, &mut reporter);

        // Unresolved is not an error; the name is looked up late, at runtime.
        assert!(!reporter.had_error());
        assert!((0..id_count).all(|i| interpreter.local_depth(ExprId(i)).is_none()));
    }
}

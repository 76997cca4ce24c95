//! End-to-end tests driving the full pipeline through the public API,
//! exactly as an embedding host would.

use loxide::lox::Lox;

/// Runs a source snippet and returns (stdout, had_error, had_runtime_error).
fn run(source: &str) -> (String, bool, bool) {
    let mut lox: Lox<Vec<u8>> = Lox::new(Vec::new());

    lox.run(source.as_bytes());

    let had_error = lox.had_error();
    let had_runtime_error = lox.had_runtime_error();

    let output = String::from_utf8(lox.into_output()).expect("print output is valid UTF-8");

    (output, had_error, had_runtime_error)
}

/// Asserts a clean run with exactly this stdout.
fn expect_output(source: &str, expected: &str) {
    let (output, had_error, had_runtime_error) = run(source);

    assert!(!had_error, "unexpected syntax/static error in {:?}", source);
    assert!(
        !had_runtime_error,
        "unexpected runtime error in {:?}",
        source
    );
    assert_eq!(output, expected);
}

fn expect_static_error(source: &str) {
    let (output, had_error, had_runtime_error) = run(source);

    assert!(had_error, "expected a static error in {:?}", source);
    assert!(!had_runtime_error);
    assert_eq!(output, "", "a program with static errors must not execute");
}

fn expect_runtime_error(source: &str) -> String {
    let (output, had_error, had_runtime_error) = run(source);

    assert!(!had_error, "unexpected static error in {:?}", source);
    assert!(had_runtime_error, "expected a runtime error in {:?}", source);

    output
}

// ─────────────────────────────────────────────────────────────────────────
// Expressions and printing
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn number_formatting_trims_trailing_zero() {
    expect_output("print 1;", "1\n");
    expect_output("print 1.5;", "1.5\n");
    expect_output("print 0;", "0\n");
    expect_output("print 2 + 3.25;", "5.25\n");
}

#[test]
fn arithmetic_precedence() {
    expect_output("print 1 + 2 * 3;", "7\n");
    expect_output("print (1 + 2) * 3;", "9\n");
    expect_output("print -4 + 6;", "2\n");
}

#[test]
fn string_concatenation() {
    expect_output("print \"foo\" + \"bar\";", "foobar\n");
    // Either operand being a string stringifies the other.
    expect_output("print \"n=\" + 4;", "n=4\n");
    expect_output("print 4 + \"!\";", "4!\n");
}

#[test]
fn equality_semantics() {
    expect_output("print nil == nil;", "true\n");
    expect_output("print nil == 0;", "false\n");
    expect_output("print \"1\" == 1;", "false\n");
    expect_output("print 1 == 1;", "true\n");
    expect_output("print \"a\" != \"b\";", "true\n");
}

#[test]
fn truthiness_only_nil_and_false_are_falsey() {
    expect_output("print !nil;", "true\n");
    expect_output("print !false;", "true\n");
    expect_output("print !0;", "false\n");
    expect_output("print !\"\";", "false\n");
}

#[test]
fn short_circuit_never_evaluates_the_right_operand() {
    expect_output(
        "fun boom() { print \"boom\"; return true; } \
         print false and boom(); \
         print true or boom();",
        "false\ntrue\n",
    );
}

#[test]
fn logical_operators_return_the_deciding_operand() {
    expect_output("print \"hi\" or 2;", "hi\n");
    expect_output("print nil or \"yes\";", "yes\n");
    expect_output("print nil and 2;", "nil\n");
    expect_output("print 1 and 2;", "2\n");
}

#[test]
fn pure_expressions_have_no_observable_effect() {
    expect_output("1 + 2; (3 * 4) == 12; \"a\" + \"b\"; -5; !true;", "");
}

// ─────────────────────────────────────────────────────────────────────────
// Variables, scoping, closures
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn var_without_initializer_is_nil() {
    expect_output("var a; print a;", "nil\n");
}

#[test]
fn blocks_shadow_and_restore() {
    expect_output(
        "var a = 1; { var a = 2; print a; } print a;",
        "2\n1\n",
    );
}

#[test]
fn scope_resolution_is_static() {
    // The closure keeps seeing the global even after the block defines a
    // shadowing `a` later.
    expect_output(
        "var a = \"global\"; \
         { \
           fun show() { print a; } \
           show(); \
           var a = \"block\"; \
           show(); \
         }",
        "global\nglobal\n",
    );
}

#[test]
fn closure_counter_retains_state() {
    expect_output(
        "fun make() { \
           var i = 0; \
           fun c() { i = i + 1; print i; } \
           return c; \
         } \
         var c = make(); c(); c(); c();",
        "1\n2\n3\n",
    );
}

#[test]
fn closures_from_separate_invocations_are_independent() {
    expect_output(
        "fun make() { \
           var i = 0; \
           fun c() { i = i + 1; print i; } \
           return c; \
         } \
         var a = make(); var b = make(); \
         a(); a(); b();",
        "1\n2\n1\n",
    );
}

#[test]
fn assignment_yields_the_assigned_value() {
    expect_output("var a = 1; print a = 2; print a;", "2\n2\n");
}

#[test]
fn undefined_variable_is_a_runtime_error() {
    expect_runtime_error("print ghost;");
    expect_runtime_error("{ ghost = 1; }");
}

#[test]
fn globals_are_late_bound_across_runs() {
    // REPL semantics: a function defined in one run may refer to a global
    // defined in a later one.
    let mut lox: Lox<Vec<u8>> = Lox::new(Vec::new());

    lox.run(b"fun show() { print answer; }");
    assert!(!lox.had_error());

    lox.run(b"var answer = 42;");
    lox.run(b"show();");

    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());

    let output = String::from_utf8(lox.into_output()).unwrap();
    assert_eq!(output, "42\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Control flow
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn if_else_branches() {
    expect_output("if (1 < 2) print \"yes\"; else print \"no\";", "yes\n");
    expect_output("if (nil) print \"yes\"; else print \"no\";", "no\n");
}

#[test]
fn while_loop_runs_until_falsey() {
    expect_output(
        "var i = 0; while (i < 3) { print i; i = i + 1; }",
        "0\n1\n2\n",
    );
}

#[test]
fn for_loop_desugars_correctly() {
    expect_output("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
}

#[test]
fn for_loop_increment_runs_after_the_body() {
    expect_output(
        "for (var i = 0; i < 2; i = i + 10) { print i; i = i + 1; }",
        "0\n",
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Functions
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn function_returns_value() {
    expect_output(
        "fun max(a, b) { if (a > b) return a; return b; } print max(3, 7);",
        "7\n",
    );
}

#[test]
fn falling_off_the_end_returns_nil() {
    expect_output("fun noop() {} print noop();", "nil\n");
}

#[test]
fn arguments_evaluate_left_to_right() {
    expect_output(
        "fun tag(n) { print n; return n; } \
         fun f(a, b, c) { return c; } \
         f(tag(1), tag(2), tag(3));",
        "1\n2\n3\n",
    );
}

#[test]
fn arity_mismatch_is_a_runtime_error() {
    let output = expect_runtime_error("fun f(a, b) { return a; } f(1);");
    assert_eq!(output, "");
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    expect_runtime_error("var x = 1; x();");
    expect_runtime_error("\"str\"();");
}

#[test]
fn functions_print_their_name() {
    expect_output("fun f() {} print f;", "<fn f>\n");
}

#[test]
fn recursion_works() {
    expect_output(
        "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
        "55\n",
    );
}

#[test]
fn clock_is_a_number_of_seconds() {
    expect_output("print clock() >= 0;", "true\n");
    expect_output("print clock;", "<native fn clock>\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn class_prints_its_name_and_instances_identify_their_class() {
    expect_output("class Foo {} print Foo;", "Foo\n");
    expect_output("class Foo {} print Foo();", "Foo instance\n");
}

#[test]
fn fields_are_created_by_assignment() {
    expect_output(
        "class Bag {} var b = Bag(); b.x = 1; b.y = 2; print b.x + b.y;",
        "3\n",
    );
}

#[test]
fn methods_bind_this() {
    expect_output(
        "class Greeter { \
           hello() { print \"hi \" + this.name; } \
         } \
         var g = Greeter(); g.name = \"lox\"; g.hello();",
        "hi lox\n",
    );
}

#[test]
fn bound_methods_remember_their_receiver() {
    expect_output(
        "class Counter { \
           init() { this.n = 0; } \
           bump() { this.n = this.n + 1; print this.n; } \
         } \
         var c = Counter(); \
         var bump = c.bump; \
         bump(); bump();",
        "1\n2\n",
    );
}

#[test]
fn initializer_receives_arguments() {
    expect_output(
        "class P { init(x) { this.x = x; } } print P(7).x;",
        "7\n",
    );
}

#[test]
fn constructor_returns_the_instance_even_with_bare_return() {
    expect_output(
        "class P { init() { this.x = 1; return; this.x = 2; } } print P().x;",
        "1\n",
    );
}

#[test]
fn calling_init_directly_returns_this() {
    expect_output(
        "class P { init() { this.x = 1; } } \
         var p = P(); \
         print p.init() == p;",
        "true\n",
    );
}

#[test]
fn fields_shadow_methods() {
    expect_output(
        "class C { m() { return \"method\"; } } \
         var c = C(); \
         c.m = \"field\"; \
         print c.m;",
        "field\n",
    );
}

#[test]
fn unknown_property_is_a_runtime_error() {
    expect_runtime_error("class C {} print C().missing;");
}

#[test]
fn property_access_on_non_instances_is_a_runtime_error() {
    expect_runtime_error("print (1).x;");
    expect_runtime_error("1 .x = 2;");
}

// ─────────────────────────────────────────────────────────────────────────
// Inheritance
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn methods_are_inherited() {
    expect_output(
        "class A { m() { print \"A\"; } } class B < A {} B().m();",
        "A\n",
    );
}

#[test]
fn super_dispatches_to_the_superclass_method() {
    expect_output(
        "class A { m() { print \"A\"; } } \
         class B < A { m() { super.m(); print \"B\"; } } \
         B().m();",
        "A\nB\n",
    );
}

#[test]
fn super_skips_the_overriding_method_two_levels_down() {
    expect_output(
        "class A { m() { print \"A\"; } } \
         class B < A { m() { print \"B\"; } } \
         class C < B { m() { super.m(); } } \
         C().m();",
        "B\n",
    );
}

#[test]
fn initializers_are_inherited() {
    expect_output(
        "class A { init(x) { this.x = x; } } \
         class B < A {} \
         print B(9).x;",
        "9\n",
    );
}

#[test]
fn superclass_must_be_a_class() {
    expect_runtime_error("var NotAClass = 1; class C < NotAClass {}");
}

#[test]
fn undefined_super_method_is_a_runtime_error() {
    expect_runtime_error(
        "class A {} class B < A { m() { super.missing(); } } B().m();",
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Static errors
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn reading_a_variable_in_its_own_initializer() {
    expect_static_error("{ var a = 1; { var a = a; } }");
}

#[test]
fn duplicate_declaration_in_the_same_scope() {
    expect_static_error("{ var a = 1; var a = 2; }");
    // Globals may be redefined freely.
    expect_output("var a = 1; var a = 2; print a;", "2\n");
}

#[test]
fn return_outside_a_function() {
    expect_static_error("return 1;");
}

#[test]
fn returning_a_value_from_an_initializer() {
    expect_static_error("class P { init() { return 1; } }");
    // A bare return is fine.
    expect_output("class P { init() { return; } } P();", "");
}

#[test]
fn this_outside_a_class() {
    expect_static_error("print this;");
    expect_static_error("fun f() { print this; }");
}

#[test]
fn super_outside_a_class_or_without_a_superclass() {
    expect_static_error("print super.m;");
    expect_static_error("class C { m() { super.m(); } }");
}

#[test]
fn a_class_cannot_inherit_from_itself() {
    expect_static_error("class Ouro < Ouro {}");
}

#[test]
fn multiple_static_errors_are_all_reported_in_one_pass() {
    // Resolution keeps going after the first diagnosis; both broken
    // constructs are rejected and nothing runs.
    expect_static_error("return 1; fun f() { print this; }");
}

#[test]
fn syntax_errors_prevent_execution() {
    let (output, had_error, _) = run("print 1; print ;");
    assert!(had_error);
    assert_eq!(output, "", "no statement may run after a syntax error");
}

// ─────────────────────────────────────────────────────────────────────────
// Runtime errors
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn type_error_on_subtraction() {
    expect_runtime_error("print \"a\" - 1;");
}

#[test]
fn type_error_on_unary_minus() {
    expect_runtime_error("print -\"a\";");
}

#[test]
fn runtime_error_aborts_the_rest_of_the_program() {
    let output = expect_runtime_error("print 1; print \"a\" - 1; print 2;");
    assert_eq!(output, "1\n");
}

#[test]
fn division_follows_ieee() {
    expect_output("print 1 / 0;", "inf\n");
}

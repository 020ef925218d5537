#[cfg(test)]
mod interpreter_tests {
    use rox::error::RuntimeError;
    use rox::interpreter::SharedBuffer;
    use rox::session::{Outcome, Session};
    use rox::value::Value;

    fn session() -> (Session, SharedBuffer) {
        let out = SharedBuffer::new();
        (Session::with_printer(Box::new(out.clone())), out)
    }

    /// Run a program that must succeed and return its printed lines.
    fn run_ok(source: &str) -> Vec<String> {
        let (mut session, out) = session();

        match session.run(source) {
            Outcome::Success(_) => out.lines(),
            other => panic!("expected success, got {:?}", other),
        }
    }

    /// Run a program that must fail at runtime; returns the error and
    /// everything printed before it.
    fn run_err(source: &str) -> (RuntimeError, Vec<String>) {
        let (mut session, out) = session();

        match session.run(source) {
            Outcome::RuntimeError(e) => (e, out.lines()),
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    // ───────────────────────── basic scenarios ─────────────────────────

    #[test]
    fn test_interpreter_01_arithmetic() {
        assert_eq!(run_ok("print 1 + 2;"), vec!["3"]);
        assert_eq!(run_ok("print (1 + 2) * 3 - 4 / 8;"), vec!["8.5"]);
        assert_eq!(run_ok("print -3;"), vec!["-3"]);
    }

    #[test]
    fn test_interpreter_02_counter_closure() {
        let source = r#"
            fun makeCounter() {
              var i = 0;
              fun count() {
                i = i + 1;
                print i;
              }
              return count;
            }

            var counter = makeCounter();
            counter();
            counter();
        "#;

        assert_eq!(run_ok(source), vec!["1", "2"]);
    }

    #[test]
    fn test_interpreter_03_super_call() {
        let source = r#"
            class Animal { speak() { print "..."; } }
            class Dog < Animal { speak() { super.speak(); print "Woof"; } }
            Dog().speak();
        "#;

        assert_eq!(run_ok(source), vec!["...", "Woof"]);
    }

    #[test]
    fn test_interpreter_04_plus_type_error() {
        let (error, printed) = run_err("print \"before\";\nprint \"a\" + 1;\nprint \"after\";");

        assert_eq!(
            error.message,
            "Operands of '+' must be two numbers or two strings."
        );
        assert_eq!(error.line, 2);
        assert_eq!(printed, vec!["before"]);
    }

    #[test]
    fn test_interpreter_05_parse_error_never_executes() {
        let (mut session, out) = session();

        match session.run("print 1;\nvar = 5;") {
            Outcome::StaticErrors(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].line(), Some(2));
            }
            other => panic!("expected static errors, got {:?}", other),
        }

        assert!(out.lines().is_empty());
    }

    // ───────────────────────── scoping ─────────────────────────

    #[test]
    fn test_interpreter_06_shadowing() {
        let source = r#"
            var x = "outer";
            {
              print x;
              var x = "inner";
              print x;
            }
            print x;
        "#;

        assert_eq!(run_ok(source), vec!["outer", "inner", "outer"]);
    }

    #[test]
    fn test_interpreter_07_nested_blocks_and_assignment() {
        let source = r#"
            var a = 1;
            {
              var b = 2;
              {
                a = a + b;
                b = 10;
              }
              print b;
            }
            print a;
        "#;

        assert_eq!(run_ok(source), vec!["10", "3"]);
    }

    #[test]
    fn test_interpreter_08_undefined_variable() {
        let (error, _) = run_err("print missing;");
        assert_eq!(error.message, "Undefined variable 'missing'.");

        let (error, _) = run_err("missing = 1;");
        assert_eq!(error.message, "Undefined variable 'missing'.");
    }

    #[test]
    fn test_interpreter_09_closures_share_captured_scope() {
        let source = r#"
            var get;
            var set;
            {
              var value = "first";
              fun g() { return value; }
              fun s(v) { value = v; }
              get = g;
              set = s;
            }
            set("second");
            print get();
        "#;

        assert_eq!(run_ok(source), vec!["second"]);
    }

    #[test]
    fn test_interpreter_10_independent_counters() {
        let source = r#"
            fun make() {
              var n = 0;
              return fun () { n = n + 1; return n; };
            }
            var a = make();
            var b = make();
            a(); a();
            print a();
            print b();
        "#;

        assert_eq!(run_ok(source), vec!["3", "1"]);
    }

    // ───────────────────────── control flow ─────────────────────────

    #[test]
    fn test_interpreter_11_for_and_while() {
        let source = r#"
            for (var i = 0; i < 3; i = i + 1) print i;
            var n = 3;
            while (n > 0) { n = n - 1; }
            print n;
        "#;

        assert_eq!(run_ok(source), vec!["0", "1", "2", "0"]);
    }

    #[test]
    fn test_interpreter_12_return_unwinds_loops() {
        let source = r#"
            fun first(limit) {
              for (var i = 0; i < limit; i = i + 1) {
                while (true) {
                  if (i == 2) return i;
                  i = i + 1;
                }
              }
              return -1;
            }
            print first(10);
        "#;

        assert_eq!(run_ok(source), vec!["2"]);
    }

    #[test]
    fn test_interpreter_13_recursion() {
        let source = r#"
            fun fib(n) {
              if (n < 2) return n;
              return fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        "#;

        assert_eq!(run_ok(source), vec!["610"]);
    }

    #[test]
    fn test_interpreter_14_logical_operators_short_circuit() {
        let source = r#"
            print nil or "default";
            print 0 and "zero is truthy";
            print false and undefinedName;
            print "x" or undefinedName;
        "#;

        assert_eq!(run_ok(source), vec!["default", "zero is truthy", "false", "x"]);
    }

    // ───────────────────────── values ─────────────────────────

    #[test]
    fn test_interpreter_15_truthiness() {
        let source = r#"
            print !nil;
            print !false;
            print !0;
            print !"";
        "#;

        assert_eq!(run_ok(source), vec!["true", "true", "false", "false"]);
    }

    #[test]
    fn test_interpreter_16_equality() {
        let source = r#"
            print 1 == 1;
            print "a" == "a";
            print nil == nil;
            print nil == false;
            print 1 == "1";
            class A {}
            var a = A();
            var b = A();
            print a == a;
            print a == b;
        "#;

        assert_eq!(
            run_ok(source),
            vec!["true", "true", "true", "false", "false", "true", "false"]
        );
    }

    #[test]
    fn test_interpreter_17_value_display() {
        let source = r#"
            print 10;
            print 2.5;
            print "text";
            print nil;
            print true;
            fun f() {}
            print f;
            print clock;
            class C { m() {} }
            print C;
            print C();
            print C().m;
        "#;

        assert_eq!(
            run_ok(source),
            vec![
                "10",
                "2.5",
                "text",
                "nil",
                "true",
                "<fn f>",
                "<native fn clock>",
                "C",
                "C instance",
                "<fn m>",
            ]
        );
    }

    #[test]
    fn test_interpreter_18_string_concatenation() {
        assert_eq!(run_ok("print \"foo\" + \"bar\";"), vec!["foobar"]);
    }

    #[test]
    fn test_interpreter_19_division_by_zero() {
        let (error, _) = run_err("print 1 / 0;");

        assert_eq!(error.message, "Division by zero.");
        assert_eq!(error.line, 1);
    }

    #[test]
    fn test_interpreter_20_comparison_requires_numbers() {
        let (error, _) = run_err("print \"a\" < \"b\";");
        assert_eq!(error.message, "Operands of '<' must be numbers.");

        let (error, _) = run_err("print 1 >= nil;");
        assert_eq!(error.message, "Operands of '>=' must be numbers.");

        let (error, _) = run_err("print -\"x\";");
        assert_eq!(error.message, "Operand of '-' must be a number.");
    }

    // ───────────────────────── calls ─────────────────────────

    #[test]
    fn test_interpreter_21_arity_mismatch() {
        let (error, _) = run_err("fun f(a, b) {}\nf(1);");

        assert_eq!(error.message, "Expected 2 arguments but got 1.");
        assert_eq!(error.line, 2);
    }

    #[test]
    fn test_interpreter_22_call_non_callable() {
        let (error, _) = run_err("\"text\"();");

        assert_eq!(error.message, "Can only call functions and classes.");
    }

    #[test]
    fn test_interpreter_23_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun f() {} print f();"), vec!["nil"]);
        assert_eq!(run_ok("fun f() { return; } print f();"), vec!["nil"]);
    }

    #[test]
    fn test_interpreter_24_stack_trace() {
        let source = "fun inner() {\n  return 1 / 0;\n}\nfun outer() {\n  inner();\n}\nouter();";
        let (error, _) = run_err(source);

        assert_eq!(error.line, 2);
        assert_eq!(
            error.trace,
            vec!["[line 5] in inner()", "[line 7] in outer()"]
        );
    }

    #[test]
    fn test_interpreter_25_clock_is_a_number() {
        let source = "var t = clock(); print t > 0;";

        assert_eq!(run_ok(source), vec!["true"]);
    }

    // ───────────────────────── classes ─────────────────────────

    #[test]
    fn test_interpreter_26_fields_and_this() {
        let source = r#"
            class Point {
              init(x, y) {
                this.x = x;
                this.y = y;
              }
              sum() { return this.x + this.y; }
            }
            var p = Point(1, 2);
            p.x = 10;
            print p.sum();
        "#;

        assert_eq!(run_ok(source), vec!["12"]);
    }

    #[test]
    fn test_interpreter_27_fields_shadow_methods() {
        let source = r#"
            class A { m() { return "method"; } }
            var a = A();
            print a.m();
            a.m = "field";
            print a.m;
        "#;

        assert_eq!(run_ok(source), vec!["method", "field"]);
    }

    #[test]
    fn test_interpreter_28_bound_method_keeps_receiver() {
        let source = r#"
            class Person {
              init(name) { this.name = name; }
              greet() { print "hi " + this.name; }
            }
            var greet = Person("ada").greet;
            greet();
        "#;

        assert_eq!(run_ok(source), vec!["hi ada"]);
    }

    #[test]
    fn test_interpreter_29_init_always_yields_instance() {
        let source = r#"
            class Box {
              init(v) {
                this.v = v;
                return;
              }
            }
            var b = Box(5);
            print b;
            print b.v;
            print b.init(7);
            print b.v;
        "#;

        assert_eq!(run_ok(source), vec!["Box instance", "5", "nil", "7"]);
    }

    #[test]
    fn test_interpreter_30_class_arity_follows_init() {
        let (error, _) = run_err("class A { init(a) {} }\nA();");
        assert_eq!(error.message, "Expected 1 arguments but got 0.");

        let (error, _) = run_err("class B {}\nB(1);");
        assert_eq!(error.message, "Expected 0 arguments but got 1.");
    }

    #[test]
    fn test_interpreter_31_inherited_init_and_methods() {
        let source = r#"
            class Base {
              init(n) { this.n = n; }
              show() { print this.n; }
            }
            class Derived < Base {}
            Derived(4).show();
        "#;

        assert_eq!(run_ok(source), vec!["4"]);
    }

    #[test]
    fn test_interpreter_32_super_is_lexical() {
        let source = r#"
            class A { method() { print "A"; } }
            class B < A {
              method() { print "B"; }
              test() { super.method(); }
            }
            class C < B {}
            C().test();
        "#;

        assert_eq!(run_ok(source), vec!["A"]);
    }

    #[test]
    fn test_interpreter_33_super_chain_three_levels() {
        let source = r#"
            class A { name() { return "A"; } }
            class B < A { name() { return "B>" + super.name(); } }
            class C < B { name() { return "C>" + super.name(); } }
            print C().name();
        "#;

        assert_eq!(run_ok(source), vec!["C>B>A"]);
    }

    #[test]
    fn test_interpreter_34_property_errors() {
        let (error, _) = run_err("class A {}\nprint A().missing;");
        assert_eq!(error.message, "Undefined property 'missing'.");
        assert_eq!(error.line, 2);

        let (error, _) = run_err("var n = 1; print n.x;");
        assert_eq!(error.message, "Only instances have properties.");

        let (error, _) = run_err("var n = 1; n.x = 2;");
        assert_eq!(error.message, "Only instances have fields.");
    }

    #[test]
    fn test_interpreter_35_superclass_must_be_class() {
        let (error, _) = run_err("var NotClass = 1;\nclass A < NotClass {}");

        assert_eq!(error.message, "Superclass must be a class.");
        assert_eq!(error.line, 2);
    }

    #[test]
    fn test_interpreter_36_this_in_nested_closure() {
        let source = r#"
            class Thing {
              getCallback() {
                fun localFunction() { print this; }
                return localFunction;
              }
            }
            var callback = Thing().getCallback();
            callback();
        "#;

        assert_eq!(run_ok(source), vec!["Thing instance"]);
    }

    // ───────────────────────── sessions ─────────────────────────

    #[test]
    fn test_interpreter_37_repl_line_reports_value() {
        let (mut session, out) = session();

        match session.run_line("1 + 2;") {
            Outcome::Success(Some(value)) => assert_eq!(value, Value::Number(3.0)),
            other => panic!("expected a value, got {:?}", other),
        }

        match session.run_line("print 4;") {
            Outcome::Success(None) => {}
            other => panic!("expected no value, got {:?}", other),
        }

        assert_eq!(out.lines(), vec!["4"]);
    }

    #[test]
    fn test_interpreter_38_globals_persist_across_lines() {
        let (mut session, out) = session();

        assert!(session.run_line("var total = 1;").is_success());
        assert!(session.run_line("fun bump() { total = total + 1; }").is_success());
        assert!(session.run_line("bump();").is_success());
        assert!(session.run_line("print total;").is_success());

        assert_eq!(out.lines(), vec!["2"]);
    }

    #[test]
    fn test_interpreter_39_session_survives_errors() {
        let (mut session, out) = session();

        assert!(matches!(
            session.run_line("print 1 +;"),
            Outcome::StaticErrors(_)
        ));
        assert!(matches!(
            session.run_line("print nope;"),
            Outcome::RuntimeError(_)
        ));
        assert!(session.run_line("print \"still here\";").is_success());

        assert_eq!(out.lines(), vec!["still here"]);
    }

    #[test]
    fn test_interpreter_40_locals_resolved_across_lines() {
        let (mut session, out) = session();

        assert!(session
            .run_line("fun make() { var x = \"captured\"; fun get() { return x; } return get; }")
            .is_success());
        assert!(session.run_line("var get = make();").is_success());
        assert!(session.run_line("print get();").is_success());

        assert_eq!(out.lines(), vec!["captured"]);
    }

    #[test]
    fn test_interpreter_41_evaluate_function_literal() {
        let (mut session, _) = session();

        match session.evaluate("(fun (x) { return x + 1; })(2)") {
            Outcome::Success(Some(value)) => assert_eq!(value, Value::Number(3.0)),
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_interpreter_42_evaluate_reports_static_errors() {
        let (mut session, _) = session();

        match session.evaluate("fun () { var a = 1; { var a = a; } }") {
            Outcome::StaticErrors(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0]
                    .to_string()
                    .ends_with("Can't read local variable in its own initializer."));
            }
            other => panic!("expected static errors, got {:?}", other),
        }

        assert!(matches!(
            session.evaluate("1 +"),
            Outcome::StaticErrors(_)
        ));
    }

    #[test]
    fn test_interpreter_43_large_numbers_use_exponent_form() {
        let source = r#"
            var big = 1000000000000000000000;
            print big / 10;
            print big;
            print big * 1000;
            print -big;
        "#;

        assert_eq!(
            run_ok(source),
            vec!["100000000000000000000", "1e+21", "1e+24", "-1e+21"]
        );
    }

    #[test]
    fn test_interpreter_44_top_level_locals_are_released() {
        let (mut session, out) = session();

        assert!(session.run_line("{ var a = 1; print a; }").is_success());
        assert_eq!(session.interpreter().resolved_locals(), 0);

        // A function body can run again later, so its bindings stay.
        assert!(session
            .run_line("fun twice(x) { return x + x; }")
            .is_success());
        let kept = session.interpreter().resolved_locals();
        assert_eq!(kept, 2);

        // A line that fails resolution records nothing.
        assert!(matches!(
            session.run_line("{ var b = 1; var b = 2; print b; }"),
            Outcome::StaticErrors(_)
        ));
        assert_eq!(session.interpreter().resolved_locals(), kept);

        assert!(session.run_line("print twice(4);").is_success());
        assert_eq!(out.lines(), vec!["1", "8"]);
    }
}

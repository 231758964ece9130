mod common;

use common::{error_kind, run_ok};
use hivescript::{Binding, Config, ErrorKind, Value, ValueKind};
use pretty_assertions::assert_eq;

const ADD: &str = "prog int add(int a, int b) { return a + b; }\n";

#[test]
fn declared_function_returns_its_value() {
    let source = format!("{ADD}int r = run add(2, 3);");
    let (outcome, _) = run_ok(&source);
    assert_eq!(outcome.environment.value("r"), Some(&Value::Int(5)));
}

#[test]
fn parameters_do_not_leak() {
    let source = format!("{ADD}int r = run add(2, 3);");
    let (outcome, _) = run_ok(&source);
    let env = &outcome.environment;
    assert!(env.contains("add"));
    assert!(!env.contains("a"));
    assert!(!env.contains("b"));
    assert_eq!(env.len(), 2);
}

#[test]
fn declaration_records_signature() {
    let (outcome, _) = run_ok(ADD);
    let Some(Binding::Function(function)) = outcome.environment.get("add") else {
        panic!("add should be a function");
    };
    let params: Vec<_> = function
        .params
        .iter()
        .map(|p| (p.name.literal, p.declared))
        .collect();
    assert_eq!(params, vec![("a", ValueKind::Int), ("b", ValueKind::Int)]);
    assert_eq!(function.return_type.literal, "int");
}

#[test]
fn functions_are_called_again_from_scratch() {
    let source = format!("{ADD}int x = run add(1, 1); int y = run add(x, 10);");
    let (outcome, _) = run_ok(&source);
    assert_eq!(outcome.environment.value("x"), Some(&Value::Int(2)));
    assert_eq!(outcome.environment.value("y"), Some(&Value::Int(12)));
}

#[test]
fn arguments_can_be_expressions() {
    let source = format!("{ADD}int n = 4; int r = run add(n * 2, (1 + 2) * 3);");
    let (outcome, _) = run_ok(&source);
    assert_eq!(outcome.environment.value("r"), Some(&Value::Int(17)));
}

#[test]
fn output_inside_a_function_reaches_the_sink() {
    let (_, printed) = run_ok(concat!(
        "prog int shout(str word) { output word . \"!\"; return 0; }\n",
        "run shout(\"hey\"); output \"after\";",
    ));
    assert_eq!(printed, "hey!\nafter\n");
}

#[test]
fn return_ends_the_call() {
    let (outcome, printed) =
        run_ok("prog int f() { output 1; return 2; output 3; }\nint r = run f();");
    assert_eq!(printed, "1\n");
    assert_eq!(outcome.environment.value("r"), Some(&Value::Int(2)));
}

#[test]
fn empty_parameter_list() {
    let (outcome, _) = run_ok("prog str name() { return \"hive\"; } str n = run name();");
    assert_eq!(outcome.environment.value("n"), Some(&Value::Str("hive".into())));
}

#[test]
fn typed_declaration_form() {
    let (outcome, _) = run_ok("int answer() { return 42; }\nint r = run answer();");
    assert_eq!(outcome.environment.value("r"), Some(&Value::Int(42)));
}

#[test]
fn int_argument_promotes_to_flt_parameter() {
    let (outcome, _) = run_ok("prog flt half(flt x) { return x / 2; }\nflt h = run half(3);");
    assert_eq!(outcome.environment.value("h"), Some(&Value::Float(1.5)));
}

#[test]
fn bodies_see_only_their_parameters() {
    assert_eq!(
        error_kind("int g = 1; prog int f() { return g; } run f();"),
        ErrorKind::UndefinedVariable
    );
}

#[test]
fn assignments_inside_a_call_stay_inside() {
    let (outcome, _) = run_ok(
        "int x = 1; prog int f(int x) { x = 99; return x; } int r = run f(5);",
    );
    assert_eq!(outcome.environment.value("x"), Some(&Value::Int(1)));
    assert_eq!(outcome.environment.value("r"), Some(&Value::Int(99)));
}

#[test]
fn nested_declarations_are_callable_inside() {
    let (outcome, _) = run_ok(concat!(
        "prog int outer() { prog int inner() { return 1; } return run inner(); }\n",
        "int r = run outer();",
    ));
    assert_eq!(outcome.environment.value("r"), Some(&Value::Int(1)));
    assert!(!outcome.environment.contains("inner"));
}

#[test]
fn call_depth_is_limited() {
    let source = concat!(
        "prog int outer() { prog int inner() { return 1; } return run inner(); }\n",
        "run outer();",
    );
    let mut out = Vec::new();
    let config = Config::default().with_max_call_depth(1);
    let err = hivescript::run_with(None, source, config, &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecursionLimit);
    assert_eq!(err.line(), 1);
}

#[test]
fn wrong_argument_count() {
    assert_eq!(
        error_kind(&format!("{ADD}run add(1);")),
        ErrorKind::ArgumentCountMismatch
    );
    assert_eq!(
        error_kind(&format!("{ADD}run add(1, 2, 3);")),
        ErrorKind::ArgumentCountMismatch
    );
}

#[test]
fn wrong_argument_type() {
    assert_eq!(
        error_kind(&format!("{ADD}run add(1, \"two\");")),
        ErrorKind::ArgumentTypeMismatch
    );
    assert_eq!(
        error_kind(&format!("{ADD}run add(1, 2.5);")),
        ErrorKind::ArgumentTypeMismatch
    );
}

#[test]
fn call_without_parentheses() {
    assert_eq!(error_kind(&format!("{ADD}run add;")), ErrorKind::CallSyntaxError);
}

#[test]
fn parentheses_are_checked_before_the_name() {
    assert_eq!(error_kind("run nowhere;"), ErrorKind::CallSyntaxError);
}

#[test]
fn calling_an_unknown_function() {
    assert_eq!(error_kind("run missing();"), ErrorKind::UndefinedFunction);
    assert_eq!(
        error_kind("int v = 1; run v();"),
        ErrorKind::UndefinedFunction
    );
}

#[test]
fn malformed_parameter_lists() {
    assert_eq!(
        error_kind("prog int f(a) { return 1; }"),
        ErrorKind::MalformedFunctionParameter
    );
    assert_eq!(
        error_kind("prog int f(int) { return 1; }"),
        ErrorKind::MalformedFunctionParameter
    );
    assert_eq!(
        error_kind("prog int f(int a; int b) { return 1; }"),
        ErrorKind::MalformedFunctionParameter
    );
}

#[test]
fn prog_needs_a_return_type() {
    assert_eq!(
        error_kind("prog add(int a) { return a; }"),
        ErrorKind::UnexpectedToken
    );
}

#[test]
fn unclosed_body() {
    assert_eq!(
        error_kind("prog int f() { return 1;"),
        ErrorKind::UnexpectedEof
    );
}

#[test]
fn function_names_are_declared_once() {
    assert_eq!(
        error_kind("prog int f() { return 1; } prog int f() { return 2; }"),
        ErrorKind::VariableAlreadyDeclared
    );
    assert_eq!(
        error_kind("int f = 0; prog int f() { return 1; }"),
        ErrorKind::VariableAlreadyDeclared
    );
}

#[test]
fn errors_in_a_body_surface_at_call_time() {
    let (outcome, _) = run_ok("prog int broken() { return nope; }");
    assert!(outcome.environment.contains("broken"));
    assert_eq!(
        error_kind("prog int broken() { return nope; } run broken();"),
        ErrorKind::UndefinedVariable
    );
}

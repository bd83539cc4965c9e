use super::*;

#[test]
fn test_top_level_sum_ends_cleanly() {
    let mut b = CodeBuilder::new();
    b.konst(2).konst(3).binop(BinOp::Add).end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(value, box_int(5));
    assert_eq!(vm.state().call_depth(), 0);
}

#[test]
fn test_binops_follow_native_integers() {
    let cases = [
        (BinOp::Add, 40, 2, 42),
        (BinOp::Sub, 40, 2, 38),
        (BinOp::Mul, -6, 7, -42),
        (BinOp::Div, 43, 5, 8),
        (BinOp::Mod, 43, 5, 3),
        (BinOp::Lt, 1, 2, 1),
        (BinOp::Le, 3, 2, 0),
        (BinOp::Gt, 3, 2, 1),
        (BinOp::Ge, 2, 2, 1),
        (BinOp::Eq, 2, 3, 0),
        (BinOp::Ne, 2, 3, 1),
        (BinOp::And, 1, 0, 0),
        (BinOp::Or, 1, 0, 1),
        (BinOp::Add, i32::MAX, 1, i32::MIN),
    ];
    for (op, a, b_val, expected) in cases {
        let mut b = CodeBuilder::new();
        b.konst(a).konst(b_val).binop(op).end();
        assert_eq!(exec_int(&b), expected, "{a} {} {b_val}", op.symbol());
    }
}

#[test]
fn test_operand_order_is_push_order() {
    // (10 - 4) / 3 with the left operand pushed first
    let mut b = CodeBuilder::new();
    b.konst(10).konst(4).binop(BinOp::Sub).konst(3).binop(BinOp::Div).end();
    assert_eq!(exec_int(&b), 2);
}

#[test]
fn test_division_by_zero_faults() {
    let mut b = CodeBuilder::new();
    b.konst(1).konst(0).binop(BinOp::Div).end();
    assert_eq!(exec_fault(&b), Fault::DivisionByZero);
}

#[test]
fn test_arithmetic_on_references_is_a_type_error() {
    let mut b = CodeBuilder::new();
    b.string("x").konst(1).binop(BinOp::Add).end();
    assert!(matches!(
        exec_fault(&b),
        Fault::TypeMismatch {
            expected: "boxed scalar",
            found: "Ref"
        }
    ));
}

#[test]
fn test_reference_equality_is_identity() {
    let mut b = CodeBuilder::new();
    b.string("x").dup().binop(BinOp::Eq).end();
    assert_eq!(exec_int(&b), 1);

    let mut b = CodeBuilder::new();
    b.string("x").string("x").binop(BinOp::Eq).end();
    assert_eq!(exec_int(&b), 0, "distinct strings are distinct objects");

    let mut b = CodeBuilder::new();
    b.string("x").konst(0).binop(BinOp::Ne).end();
    assert_eq!(exec_int(&b), 1);
}

#[test]
fn test_read_and_write_builtins() {
    let mut b = CodeBuilder::new();
    b.read().read().binop(BinOp::Mul).write().end();
    let (_, result, output) = exec_with_config(&b, &test_config(), "6\n7\n");
    assert_eq!(result.unwrap(), box_int(0), "Lwrite pushes boxed zero");
    assert_eq!(output, "> > 42\n");
}

#[test]
fn test_read_past_end_of_input_fails() {
    let mut b = CodeBuilder::new();
    b.read().end();
    let (_, result, _) = exec_with_config(&b, &test_config(), "");
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("unexpected end of input"));
}

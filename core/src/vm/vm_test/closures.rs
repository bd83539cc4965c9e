use super::*;

#[test]
fn test_closure_captures_by_value() {
    // x = 10; f = fun () { x }; x = 99; f()
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.begin(2, 1).konst(10).st(LocKind::Local, 0).drop_top();
    b.closure(body, &[(LocKind::Local, 0)]);
    b.konst(99).st(LocKind::Local, 0).drop_top();
    b.callc(0).end();
    b.bind(body).cbegin(0, 0).ld(LocKind::Capture, 0).end();
    assert_eq!(exec_int(&b), 10);
}

#[test]
fn test_closure_returned_from_function_keeps_capture() {
    // make_adder(n) = fun (x) { n + x }; make_adder(5)(7)
    let mut b = CodeBuilder::new();
    let make = b.label();
    let add = b.label();
    b.begin(2, 0).konst(5).call(make, 1).konst(7).callc(1).end();
    b.bind(make).begin(1, 0).closure(add, &[(LocKind::Arg, 0)]).end();
    b.bind(add)
        .cbegin(1, 0)
        .ld(LocKind::Capture, 0)
        .ld(LocKind::Arg, 0)
        .binop(BinOp::Add)
        .end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(value, box_int(12));
    assert_eq!(vm.state().stack().depth(), 1, "closure reference discarded on return");
}

#[test]
fn test_capture_cells_are_writable_through_addresses() {
    // f = fun () { c0 := 3; c0 }
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.begin(2, 0).konst(1).closure(body, &[(LocKind::Arg, 0)]);
    b.callc(0).binop(BinOp::Add).end();
    b.bind(body)
        .cbegin(0, 0)
        .lda(LocKind::Capture, 0)
        .konst(3)
        .sta()
        .drop_top()
        .ld(LocKind::Capture, 0)
        .end();
    assert_eq!(exec_int(&b), 4);
}

#[test]
fn test_global_captures_copy_current_value() {
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.globals(1).konst(21).st(LocKind::Global, 0).drop_top();
    b.closure(body, &[(LocKind::Global, 0)]);
    b.konst(0).st(LocKind::Global, 0).drop_top();
    b.callc(0).end();
    b.bind(body)
        .cbegin(0, 0)
        .ld(LocKind::Capture, 0)
        .ld(LocKind::Capture, 0)
        .binop(BinOp::Add)
        .end();
    assert_eq!(exec_int(&b), 42);
}

#[test]
fn test_capture_index_is_bounds_checked() {
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.konst(1).closure(body, &[(LocKind::Global, 0)]).callc(0).end();
    b.bind(body).cbegin(0, 0).ld(LocKind::Capture, 1).end();
    b.globals(1);
    assert_eq!(exec_fault(&b), Fault::CaptureOutOfRange { index: 1, count: 1 });
}

#[test]
fn test_callc_requires_a_closure() {
    let mut b = CodeBuilder::new();
    b.konst(1).callc(0).end();
    assert_eq!(
        exec_fault(&b),
        Fault::TypeMismatch {
            expected: "closure",
            found: "Int"
        }
    );

    let mut b = CodeBuilder::new();
    b.string("f").callc(0).end();
    assert_eq!(
        exec_fault(&b),
        Fault::TypeMismatch {
            expected: "closure",
            found: "String"
        }
    );
}

#[test]
fn test_capture_access_outside_closure_frame_faults() {
    let mut b = CodeBuilder::new();
    b.globals(1).begin(2, 0).ld(LocKind::Capture, 0).end();
    assert!(matches!(
        exec_fault(&b),
        Fault::TypeMismatch {
            expected: "closure",
            ..
        }
    ));
}

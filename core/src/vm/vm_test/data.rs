use super::*;

#[test]
fn test_array_preserves_push_order() {
    for (index, expected) in [(0, 1), (1, 2), (2, 3)] {
        let mut b = CodeBuilder::new();
        b.konst(1).konst(2).konst(3).barray(3).konst(index).elem().end();
        assert_eq!(exec_int(&b), expected);
    }
}

#[test]
fn test_stringified_array() {
    let mut b = CodeBuilder::new();
    b.konst(1).string("two").konst(3).barray(3).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "[1, \"two\", 3]");
}

#[test]
fn test_sta_through_index_updates_element() {
    let mut b = CodeBuilder::new();
    b.globals(1);
    b.konst(1).konst(2).konst(3).barray(3).st(LocKind::Global, 0).drop_top();
    b.ld(LocKind::Global, 0).konst(1).konst(42).sta();
    b.ld(LocKind::Global, 0).konst(1).elem().binop(BinOp::Add).end();
    // STA pushed 42, the element now reads 42
    assert_eq!(exec_int(&b), 84);
}

#[test]
fn test_sta_through_address_updates_cell() {
    let mut b = CodeBuilder::new();
    b.begin(2, 1)
        .lda(LocKind::Local, 0)
        .konst(7)
        .sta()
        .ld(LocKind::Local, 0)
        .binop(BinOp::Mul)
        .end();
    assert_eq!(exec_int(&b), 49);

    let mut b = CodeBuilder::new();
    b.globals(2)
        .lda(LocKind::Global, 1)
        .konst(5)
        .sta()
        .drop_top()
        .ld(LocKind::Global, 1)
        .end();
    assert_eq!(exec_int(&b), 5);
}

#[test]
fn test_sta_into_string_stores_bytes() {
    let mut b = CodeBuilder::new();
    b.globals(1).string("abc").st(LocKind::Global, 0);
    b.konst(0).konst(b'z' as i32).sta().drop_top();
    b.ld(LocKind::Global, 0).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "\"zbc\"");
}

#[test]
fn test_elem_on_string_yields_byte() {
    let mut b = CodeBuilder::new();
    b.string("hey").konst(1).elem().end();
    assert_eq!(exec_int(&b), b'e' as i32);
}

#[test]
fn test_elem_out_of_range_faults() {
    let mut b = CodeBuilder::new();
    b.konst(1).barray(1).konst(1).elem().end();
    assert_eq!(exec_fault(&b), Fault::ElementOutOfRange { index: 1, len: 1 });
}

#[test]
fn test_sexp_fields_and_tag() {
    let mut b = CodeBuilder::new();
    b.konst(1).konst(2).sexp("Pair", 2).konst(1).elem().end();
    assert_eq!(exec_int(&b), 2);

    let mut b = CodeBuilder::new();
    b.konst(1).string("x").sexp("Some", 2).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "Some (1, \"x\")");

    let mut b = CodeBuilder::new();
    b.sexp("Nil", 0).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "Nil");
}

#[test]
fn test_cons_cells_render_as_list() {
    let mut b = CodeBuilder::new();
    b.konst(1).konst(2).konst(0).sexp("cons", 2).sexp("cons", 2).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "{1, 2}");
}

#[test]
fn test_invalid_tag_names_fail() {
    let mut b = CodeBuilder::new();
    b.sexp("no-dash", 0).end();
    let (_, result, _) = exec_with_config(&b, &test_config(), "");
    assert!(format!("{:#}", result.unwrap_err()).contains("tagHash"));
}

#[test]
fn test_length_builtin() {
    let mut b = CodeBuilder::new();
    b.string("hello").length().end();
    assert_eq!(exec_int(&b), 5);

    let mut b = CodeBuilder::new();
    b.konst(1).konst(2).barray(2).length().end();
    assert_eq!(exec_int(&b), 2);

    let mut b = CodeBuilder::new();
    b.konst(1).sexp("One", 1).length().end();
    assert_eq!(exec_int(&b), 1);
}

#[test]
fn test_stringify_closure_shows_entry() {
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.closure(body, &[]).stringify().end();
    b.bind(body).cbegin(0, 0).konst(0).end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "<closure 0x0000000b>");
}

#[test]
fn test_fail_reports_line_and_column() {
    let mut b = CodeBuilder::new();
    b.konst(0).fail(7, 4);
    assert_eq!(exec_fault(&b), Fault::MatchFailure { line: 7, column: 4 });
}

#[test]
fn test_failure_message_mentions_source_line() {
    let mut b = CodeBuilder::new();
    b.line(12).fail(12, 9);
    let (_, result, _) = exec_with_config(&b, &test_config(), "");
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("line 12"), "{message}");
    assert!(message.contains("FAIL at 12:9"), "{message}");
}

#[test]
fn test_stringify_self_referencing_array() {
    let mut b = CodeBuilder::new();
    b.globals(1);
    b.konst(0).barray(1).st(LocKind::Global, 0).drop_top();
    b.ld(LocKind::Global, 0).konst(0).ld(LocKind::Global, 0).sta().drop_top();
    b.ld(LocKind::Global, 0).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "[<cycle>]");
}

#[test]
fn test_stringify_cons_with_tail_pointing_back() {
    let mut b = CodeBuilder::new();
    b.globals(1);
    b.konst(1).konst(0).sexp("cons", 2).st(LocKind::Global, 0).drop_top();
    b.ld(LocKind::Global, 0).konst(1).ld(LocKind::Global, 0).sta().drop_top();
    b.ld(LocKind::Global, 0).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "{1, <cycle>}");
}

#[test]
fn test_stringify_shared_subterm_is_not_a_cycle() {
    let mut b = CodeBuilder::new();
    b.globals(1);
    b.string("s").st(LocKind::Global, 0).drop_top();
    b.ld(LocKind::Global, 0).ld(LocKind::Global, 0).barray(2).stringify().end();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(heap_string(&vm, value), "[\"s\", \"s\"]");
}

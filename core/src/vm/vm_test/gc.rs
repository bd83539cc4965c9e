use super::*;

/// Builds `list = i :: list` for i in 0..n, dropping a fresh string each
/// round, then renders the list.
fn list_program(n: i32) -> CodeBuilder {
    let mut b = CodeBuilder::new();
    let top = b.label();
    let done = b.label();
    b.globals(2);
    b.bind(top)
        .ld(LocKind::Global, 1)
        .konst(n)
        .binop(BinOp::Lt)
        .cjmpz(done);
    b.ld(LocKind::Global, 1)
        .ld(LocKind::Global, 0)
        .sexp("cons", 2)
        .st(LocKind::Global, 0)
        .drop_top();
    b.string("garbage").drop_top();
    b.ld(LocKind::Global, 1)
        .konst(1)
        .binop(BinOp::Add)
        .st(LocKind::Global, 1)
        .drop_top()
        .jmp(top);
    b.bind(done).ld(LocKind::Global, 0).stringify().end();
    b
}

fn expected_list(n: i32) -> String {
    let items: Vec<String> = (0..n).rev().map(|i| i.to_string()).collect();
    format!("{{{}}}", items.join(", "))
}

fn render(b: &CodeBuilder, config: &VmConfig) -> (Vm, String) {
    let (vm, result, _) = exec_with_config(b, config, "");
    let value = result.expect("program should run to completion");
    let text = heap_string(&vm, value);
    (vm, text)
}

#[test]
fn test_results_do_not_depend_on_collection_schedule() {
    let b = list_program(20);
    let expected = expected_list(20);
    let tight = VmConfig {
        gc_threshold: 4,
        ..test_config()
    };
    for config in [test_config(), stress_config(), tight] {
        let (vm, text) = render(&b, &config);
        assert_eq!(text, expected, "{config:?}");
        assert_eq!(vm.heap().extra_root_depth(), 0);
    }
}

#[test]
fn test_stress_mode_reclaims_garbage() {
    let (vm, _) = render(&list_program(20), &stress_config());
    let stats = vm.heap().stats();
    assert!(stats.collections > 0);
    assert!(stats.freed > 0);
}

#[test]
fn test_explicit_collection_keeps_globals_and_drops_results() {
    let (mut vm, result, _) = exec_with_config(&list_program(5), &test_config(), "");
    let rendered = result.unwrap().as_obj().unwrap();
    vm.collect_garbage();
    // the list hangs off G(0); the rendered string was only held by the caller
    let list = vm.state().stack().globals()[0];
    assert_eq!(vm.stringify(list).unwrap(), "{4, 3, 2, 1, 0}");
    assert!(!vm.heap().contains(rendered));
    assert_eq!(vm.heap().live_objects(), 5);
}

#[test]
fn test_aggregates_of_fresh_strings_survive_stress() {
    let mut b = CodeBuilder::new();
    b.string("a").string("b").string("c").barray(3).stringify().end();
    let (_, text) = render(&b, &stress_config());
    assert_eq!(text, "[\"a\", \"b\", \"c\"]");

    let mut b = CodeBuilder::new();
    b.string("left").string("right").sexp("Node", 2).stringify().end();
    let (_, text) = render(&b, &stress_config());
    assert_eq!(text, "Node (\"left\", \"right\")");
}

#[test]
fn test_closure_captures_survive_stress() {
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.globals(1).string("kept").st(LocKind::Global, 0).drop_top();
    b.closure(body, &[(LocKind::Global, 0)]);
    b.konst(0).st(LocKind::Global, 0).drop_top();
    b.string("noise").drop_top();
    b.callc(0).stringify().end();
    b.bind(body).cbegin(0, 0).ld(LocKind::Capture, 0).end();
    let (_, text) = render(&b, &stress_config());
    assert_eq!(text, "\"kept\"");
}

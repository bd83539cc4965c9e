use super::*;
use crate::vm::exec::Flow;

/// main() = f(3, 4) where f(a, b) = a - b
fn call_program() -> (CodeBuilder, u32, u32) {
    let mut b = CodeBuilder::new();
    let f = b.label();
    b.begin(2, 1).konst(3).konst(4);
    let call_at = b.here();
    b.call(f, 2);
    let after = b.here();
    b.end();
    b.bind(f)
        .begin(2, 3)
        .ld(LocKind::Arg, 0)
        .ld(LocKind::Arg, 1)
        .binop(BinOp::Sub)
        .end();
    (b, call_at, after)
}

fn step_until(vm: &mut Vm, console: &mut BufferConsole, ip: u32) {
    for _ in 0..1000 {
        if vm.state().ip() == ip as usize {
            return;
        }
        match vm.step(console).expect("step") {
            Flow::Next => {}
            Flow::Halt(_) => panic!("halted before reaching 0x{ip:08x}"),
        }
    }
    panic!("never reached 0x{ip:08x}");
}

#[test]
fn test_call_passes_arguments_in_push_order() {
    let (b, _, _) = call_program();
    assert_eq!(exec_int(&b), -1);
}

#[test]
fn test_frame_teardown_is_exact() {
    let (b, call_at, after) = call_program();
    let mut vm = new_vm(&b, &test_config());
    let mut console = BufferConsole::with_input("");

    step_until(&mut vm, &mut console, call_at);
    let depth = vm.state().stack().depth();
    let fp = vm.state().fp();
    let calls = vm.state().call_depth();
    let (n_args, n_locals) = (vm.state().n_args(), vm.state().n_locals());

    vm.step(&mut console).unwrap();
    assert_eq!(vm.state().call_depth(), calls + 1, "return address pushed");
    step_until(&mut vm, &mut console, after);

    assert_eq!(vm.state().stack().depth(), depth - 2 + 1, "arguments consumed, result pushed");
    assert_eq!(vm.state().fp(), fp);
    assert_eq!(vm.state().call_depth(), calls);
    assert_eq!((vm.state().n_args(), vm.state().n_locals()), (n_args, n_locals));
    assert_eq!(vm.state().stack().peek(0).unwrap(), box_int(-1));
}

#[test]
fn test_entry_frame_consumes_seeded_arguments() {
    let (b, _, _) = call_program();
    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(value, box_int(-1));
    assert_eq!(vm.state().stack().depth(), 1, "only the result is left");
    assert_eq!(vm.state().call_depth(), 0);
}

#[test]
fn test_recursive_factorial() {
    let mut b = CodeBuilder::new();
    let fact = b.label();
    let recurse = b.label();
    b.begin(2, 0).konst(6).call(fact, 1).end();
    b.bind(fact)
        .begin(1, 0)
        .ld(LocKind::Arg, 0)
        .konst(1)
        .binop(BinOp::Le)
        .cjmpz(recurse)
        .konst(1)
        .end();
    b.bind(recurse)
        .ld(LocKind::Arg, 0)
        .ld(LocKind::Arg, 0)
        .konst(1)
        .binop(BinOp::Sub)
        .call(fact, 1)
        .binop(BinOp::Mul)
        .end();
    assert_eq!(exec_int(&b), 720);
}

#[test]
fn test_repeated_calls_do_not_leak_stack() {
    // for i in 0..500 { drop(id(i)) }; return 77
    let mut b = CodeBuilder::new();
    let id = b.label();
    let top = b.label();
    let done = b.label();
    b.begin(2, 1);
    b.bind(top)
        .ld(LocKind::Local, 0)
        .konst(500)
        .binop(BinOp::Lt)
        .cjmpz(done);
    b.ld(LocKind::Local, 0).call(id, 1).drop_top();
    b.ld(LocKind::Local, 0)
        .konst(1)
        .binop(BinOp::Add)
        .st(LocKind::Local, 0)
        .drop_top()
        .jmp(top);
    b.bind(done).konst(77).end();
    b.bind(id).begin(1, 2).ld(LocKind::Arg, 0).end();

    let (vm, value) = exec_with_new_vm(&b);
    assert_eq!(value, box_int(77));
    assert_eq!(vm.state().stack().depth(), 1);
}

#[test]
fn test_locals_start_as_boxed_zero() {
    let mut b = CodeBuilder::new();
    b.begin(2, 3)
        .ld(LocKind::Local, 2)
        .konst(5)
        .binop(BinOp::Add)
        .end();
    assert_eq!(exec_int(&b), 5);
}

#[test]
fn test_out_of_range_locations_fault() {
    let mut b = CodeBuilder::new();
    b.begin(2, 1).ld(LocKind::Local, 1).end();
    assert_eq!(exec_fault(&b), Fault::LocalOutOfRange { index: 1, count: 1 });

    let mut b = CodeBuilder::new();
    b.begin(2, 0).ld(LocKind::Arg, 2).end();
    assert_eq!(exec_fault(&b), Fault::ArgumentOutOfRange { index: 2, count: 2 });

    let mut b = CodeBuilder::new();
    b.globals(1).ld(LocKind::Global, 5).end();
    assert_eq!(exec_fault(&b), Fault::GlobalOutOfRange { index: 5 });

    let mut b = CodeBuilder::new();
    b.begin(2, 1).st(LocKind::Local, -1).end();
    assert_eq!(exec_fault(&b), Fault::NegativeIndex { index: -1 });
}

#[test]
fn test_unknown_location_kind_faults() {
    let mut b = CodeBuilder::new();
    b.raw(&[0x27]).raw(&0i32.to_le_bytes()).end();
    assert_eq!(exec_fault(&b), Fault::UnknownLocation(7));
}

#[test]
fn test_unbounded_recursion_overflows_call_stack() {
    let mut b = CodeBuilder::new();
    let f = b.label();
    b.bind(f).begin(0, 0).call(f, 0);
    let config = VmConfig {
        call_stack_words: 64,
        ..test_config()
    };
    assert_eq!(exec_fault_with(&b, &config), Fault::CallStackOverflow);
}

#[test]
fn test_unbounded_pushes_overflow_operand_stack() {
    let mut b = CodeBuilder::new();
    let top = b.label();
    b.bind(top).konst(1).jmp(top);
    let config = VmConfig {
        operand_stack_words: 32,
        ..test_config()
    };
    assert_eq!(exec_fault_with(&b, &config), Fault::OperandStackOverflow);
}

#[test]
fn test_popping_empty_stack_underflows() {
    let mut b = CodeBuilder::new();
    b.drop_top().drop_top().drop_top().end();
    assert_eq!(exec_fault(&b), Fault::OperandStackUnderflow);
}

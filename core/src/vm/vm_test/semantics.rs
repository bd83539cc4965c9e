use super::*;
use crate::bytecode::BytecodeImage;

#[test]
fn test_reserved_instructions_are_rejected() {
    let cases: [(fn(&mut CodeBuilder) -> &mut CodeBuilder, &str); 3] = [
        (CodeBuilder::ret, "RET"),
        (CodeBuilder::swap, "SWAP"),
        (CodeBuilder::sti, "STI"),
    ];
    for (emit, name) in cases {
        let mut b = CodeBuilder::new();
        b.konst(1).konst(2);
        emit(&mut b);
        b.end();
        assert_eq!(exec_fault(&b), Fault::Unsupported(name));
    }
}

#[test]
fn test_invalid_opcodes_fault_when_reached() {
    let mut b = CodeBuilder::new();
    b.konst(1).raw(&[0x80]);
    assert_eq!(exec_fault(&b), Fault::InvalidOpcode { class: 8, op: 0 });

    let mut b = CodeBuilder::new();
    b.konst(1).konst(2).raw(&[0x0E]);
    assert_eq!(exec_fault(&b), Fault::UnknownOperator(14));
}

#[test]
fn test_unreached_garbage_is_harmless() {
    let mut b = CodeBuilder::new();
    b.konst(3).end().raw(&[0x80, 0xEE]);
    assert_eq!(exec_int(&b), 3);
}

#[test]
fn test_string_pool_index_is_checked() {
    let mut code = vec![0x11];
    code.extend_from_slice(&99i32.to_le_bytes());
    code.push(0x16);
    let image = BytecodeImage::new(b"a\0".to_vec(), Vec::new(), 0, code);
    let mut vm = Vm::new(image, &test_config()).unwrap();
    let err = vm.run(&mut BufferConsole::with_input("")).unwrap_err();
    assert_eq!(err.downcast_ref::<Fault>(), Some(&Fault::StringIndexOutOfRange { offset: 99 }));
}

#[test]
fn test_fault_context_names_offset() {
    let mut b = CodeBuilder::new();
    b.konst(1).konst(0).binop(BinOp::Mod).end();
    let (_, result, _) = exec_with_config(&b, &test_config(), "");
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("at offset 0x0000000a"), "{message}");
    assert!(message.contains("division by zero"), "{message}");
}

#[test]
fn test_steps_are_counted() {
    let mut b = CodeBuilder::new();
    b.konst(1).konst(2).binop(BinOp::Add).end();
    let (vm, _) = exec_with_new_vm(&b);
    assert_eq!(vm.steps(), 4);
}

#[test]
fn test_stress_mode_does_not_change_results() {
    let mut b = CodeBuilder::new();
    let body = b.label();
    b.globals(1).begin(2, 1);
    b.string("ab").konst(1).barray(2).st(LocKind::Local, 0).drop_top();
    b.closure(body, &[(LocKind::Local, 0)]).callc(0);
    b.stringify().end();
    b.bind(body)
        .cbegin(0, 0)
        .ld(LocKind::Capture, 0)
        .konst(0)
        .elem()
        .sexp("Wrap", 1)
        .end();

    let run = |config: &VmConfig| {
        let (vm, result, _) = exec_with_config(&b, config, "");
        heap_string(&vm, result.expect("run"))
    };
    let plain = run(&test_config());
    assert_eq!(plain, "Wrap (\"ab\")");
    assert_eq!(run(&stress_config()), plain);
}

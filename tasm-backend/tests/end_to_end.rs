//! Compile assembly, run it on the tape machine, read the registers back

use pretty_assertions::assert_eq;
use tasm_backend::{compile, CompiledProgram};
use tasm_interp::{Debugger, Interpreter};

const MAX_STEPS: u64 = 500_000_000;

fn start(compiled: &CompiledProgram, input: &[u8], use_cursor: bool) -> Debugger {
    let mut interp = Interpreter::new(&compiled.code, compiled.geometry.config.cell_range).unwrap();
    interp.set_input(input.to_vec());
    let debugger = Debugger::new(interp, compiled.geometry.clone());
    if use_cursor {
        debugger.with_final_cursor(compiled.final_cursor)
    } else {
        debugger
    }
}

fn run_with_input(source: &str, input: &[u8]) -> Debugger {
    let compiled = compile(source, "test.tasm").unwrap();
    let mut debugger = start(&compiled, input, true);
    debugger.run(MAX_STEPS).unwrap();
    assert!(debugger.finished(), "program did not finish within {MAX_STEPS} steps");
    debugger
}

fn run(source: &str) -> Debugger {
    run_with_input(source, b"")
}

fn reg(debugger: &Debugger, name: &str) -> i128 {
    debugger.register(name).unwrap()
}

#[test]
fn test_negate_wide_value() {
    let debugger = run("4 256 14 5\nmov r0 123456789\nneg r0\n");
    assert_eq!(reg(&debugger, "r0"), -123_456_789);
}

#[test]
fn test_push_pop() {
    let debugger = run("4 256 14 5\npush 1234\npush -1\npop r1\npop r0\n");
    assert_eq!(reg(&debugger, "r0"), 1234);
    assert_eq!(reg(&debugger, "r1"), -1);
    let inspector = debugger.inspector();
    assert_eq!(inspector.stack_value(0), 1234);
    assert_eq!(inspector.stack_value(1), (1i128 << 32) - 1);
}

#[test]
fn test_arithmetic_with_aliasing() {
    let debugger = run(
        "2 256 4 3
        mov r0 300
        mov r1 -45
        add r2 r0 r1
        sub r0 r1 r0
        add r1 r1 10
        sub r1 5 r1
        ",
    );
    assert_eq!(reg(&debugger, "r2"), 255);
    assert_eq!(reg(&debugger, "r0"), -345);
    assert_eq!(reg(&debugger, "r1"), 40);
}

#[test]
fn test_folded_immediates() {
    let debugger = run(
        "2 256 4 5
        add r0 7 -9
        less r1 -3 2
        eq r2 4 4
        logic_or r3 0 256
        sub r4 3 r4
        ",
    );
    assert_eq!(reg(&debugger, "r0"), -2);
    assert_eq!(reg(&debugger, "r1"), 1);
    assert_eq!(reg(&debugger, "r2"), 1);
    // only the low cell of an immediate counts as its truth value
    assert_eq!(reg(&debugger, "r3"), 0);
    assert_eq!(reg(&debugger, "r4"), 3);
}

#[test]
fn test_signed_comparisons() {
    let pairs = [(-5, 3), (3, -5), (-7, -2), (-2, -7), (4, 4), (-32768, 32767), (0, -1), (200, 300)];
    for (a, b) in pairs {
        let source = format!(
            "2 256 6 5
            mov r0 {a}
            mov r1 {b}
            less r2 r0 r1
            eq r3 r0 r1
            eq r4 r0 {b}
            "
        );
        let debugger = run(&source);
        assert_eq!(reg(&debugger, "r2"), (a < b) as i128, "{a} < {b}");
        assert_eq!(reg(&debugger, "r3"), (a == b) as i128, "{a} == {b}");
        assert_eq!(reg(&debugger, "r4"), (a == b) as i128, "{a} == {b} (immediate)");
        assert_eq!(reg(&debugger, "r0"), a as i128);
    }
}

#[test]
fn test_logic_and_complement() {
    let debugger = run(
        "2 256 6 5
        mov r0 2
        mov r1 0
        logic_and r2 r0 r1
        logic_or r3 r0 r1
        logic_and r3 r3 True
        logic_not r1
        logic_not r0
        mov r4 5
        binary_not r4
        ",
    );
    assert_eq!(reg(&debugger, "r2"), 0);
    assert_eq!(reg(&debugger, "r3"), 1);
    assert_eq!(reg(&debugger, "r1"), 1);
    assert_eq!(reg(&debugger, "r0"), 0);
    assert_eq!(reg(&debugger, "r4"), -6);
}

#[test]
fn test_counting_loop() {
    let debugger = run(
        "2 256 6 3
        mov r0 0
        mov r1 5
        label loop
        add r0 r0 3
        sub r1 r1 1
        jnz r1 loop
        ",
    );
    assert_eq!(reg(&debugger, "r0"), 15);
    assert_eq!(reg(&debugger, "r1"), 0);
}

#[test]
fn test_backward_jmp_with_exit_condition() {
    let debugger = run(
        "2 256 6 3
        mov r0 0
        label top
        add r0 r0 1
        eq r1 r0 4
        jnz r1 done
        jmp top
        label done
        mov r2 7
        ",
    );
    assert_eq!(reg(&debugger, "r0"), 4);
    assert_eq!(reg(&debugger, "r2"), 7);
}

#[test]
fn test_jnz_immediates_fold() {
    let debugger = run(
        "1 256 4 2
        jnz 0 skip
        mov r0 1
        jnz True skip
        mov r1 1
        label skip
        ",
    );
    assert_eq!(reg(&debugger, "r0"), 1);
    assert_eq!(reg(&debugger, "r1"), 0);
}

#[test]
fn test_call_and_return() {
    let debugger = run(
        "2 256 6 3
        mov r0 1
        call double
        call double
        mov r2 99
        jmp exit
        label double
        add r0 r0 r0
        ret
        ",
    );
    assert_eq!(reg(&debugger, "r0"), 4);
    assert_eq!(reg(&debugger, "r2"), 99);
}

#[test]
fn test_recursive_calls() {
    let debugger = run(
        "2 256 6 3
        mov r0 4
        mov r1 0
        call sum
        jmp exit
        label sum
        add r1 r1 r0
        sub r0 r0 1
        jnz r0 recurse
        ret
        label recurse
        call sum
        ret
        ",
    );
    assert_eq!(reg(&debugger, "r1"), 10);
    assert_eq!(reg(&debugger, "r0"), 0);
}

#[test]
fn test_memory_round_trip() {
    let source = "2 256 6 3
        store 3 1000
        store 1 -2
        mov r0 3
        load r1 r0
        load r2 1
        store 0 r1
        ";
    let debugger = run(source);
    assert_eq!(reg(&debugger, "r1"), 1000);
    assert_eq!(reg(&debugger, "r2"), -2);
    assert_eq!(debugger.inspector().memory_value(0), 1000);
    assert_eq!(debugger.inspector().memory_value(3), 1000);
}

#[test]
fn test_diagnostics_track_the_same_window() {
    let source = "2 256 6 3 True
        store 2 77
        load r1 2
        ";
    let compiled = compile(source, "diag.tasm").unwrap();
    let mut debugger = start(&compiled, b"", false);
    let report = debugger.run(MAX_STEPS).unwrap();
    assert!(debugger.finished());
    assert!(report.diagnostics.iter().any(|d| d == "move_vmc 1"));
    assert!(report.diagnostics.iter().any(|d| d == "print load r1 2"));
    assert_eq!(debugger.current_window(), 2);
    assert_eq!(reg(&debugger, "r1"), 77);

    let located = run(source);
    assert_eq!(located.current_window(), 2);
    assert_eq!(reg(&located, "r1"), 77);
}

#[test]
fn test_read_write() {
    let debugger = run_with_input(
        "1 256 4 2
        read r0
        add r0 r0 1
        write r0
        write 10
        read r1
        write r1
        ",
        b"A",
    );
    assert_eq!(debugger.interpreter().output(), b"B\n\0");
}

#[test]
fn test_empty_program_runs() {
    let debugger = run("3 10 1 1\n");
    assert_eq!(debugger.steps(), 0);
    assert_eq!(reg(&debugger, "r0"), 0);
}

#[test]
fn test_cell_range_not_power_of_two() {
    let debugger = run(
        "3 10 4 3
        mov r0 -12
        mov r1 7
        less r2 r0 r1
        add r1 r1 r0
        ",
    );
    assert_eq!(reg(&debugger, "r2"), 1);
    assert_eq!(reg(&debugger, "r1"), -5);
}

#[test]
fn test_odd_cell_range_signed_less() {
    // 5^2 = 25 values, signed from -13 to 11
    let pairs = [(-13, 11), (11, -13), (-3, 2), (2, -3), (-1, -1), (0, -1), (-7, -6), (11, 10), (-13, -12)];
    for (a, b) in pairs {
        let source = format!(
            "2 5 4 4
            mov r0 {a}
            mov r1 {b}
            less r2 r0 r1
            less r3 r1 {a}
            "
        );
        let debugger = run(&source);
        assert_eq!(reg(&debugger, "r2"), (a < b) as i128, "{a} < {b}");
        assert_eq!(reg(&debugger, "r3"), (b < a) as i128, "{b} < {a}");
        assert_eq!(reg(&debugger, "r0"), a as i128);
        assert_eq!(reg(&debugger, "r1"), b as i128);
    }
}

#[test]
fn test_negate_twice_and_minimum() {
    let debugger = run(
        "2 256 4 3
        mov r0 -32768
        neg r0
        mov r1 -4321
        neg r1
        neg r1
        mov r2 32767
        neg r2
        ",
    );
    assert_eq!(reg(&debugger, "r0"), -32768);
    assert_eq!(reg(&debugger, "r1"), -4321);
    assert_eq!(reg(&debugger, "r2"), -32767);
}

#[test]
fn test_load_straight_after_store() {
    let debugger = run(
        "2 256 4 3
        mov r0 -300
        store 2 r0
        load r1 2
        store 2 32767
        load r2 2
        ",
    );
    assert_eq!(debugger.current_window(), 2);
    assert_eq!(reg(&debugger, "r1"), -300);
    assert_eq!(reg(&debugger, "r2"), 32767);
    assert_eq!(debugger.inspector().memory_value(2), 32767);
}

#[test]
fn test_register_extremes_survive_copies() {
    let debugger = run(
        "2 256 4 4
        mov r0 -32768
        mov r1 32767
        mov r2 r0
        mov r3 r1
        mov r0 r3
        mov r1 r2
        ",
    );
    assert_eq!(reg(&debugger, "r0"), 32767);
    assert_eq!(reg(&debugger, "r1"), -32768);
    assert_eq!(reg(&debugger, "r2"), -32768);
    assert_eq!(reg(&debugger, "r3"), 32767);
}

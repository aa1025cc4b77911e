//! Instruction lowering
//!
//! Each opcode becomes a sequence of [`Emitter`] operations. Operands are
//! folded when both are immediates and copied into temporaries when an
//! operation would otherwise destroy them or read an aliased destination.

use log::trace;
use tasm_codegen::{block_distance, Emitter, Source, Temp};
use tasm_common::{CompilerError, CompilerResult};
use tasm_frontend::{Instruction, Opcode, Operand, Program};

/// Lower one instruction. Every temporary booked here is released on return.
pub fn lower_instruction(e: &mut Emitter, program: &Program, insn: &Instruction) -> CompilerResult<()> {
    trace!("lowering '{insn}' in block {}", insn.block);
    match insn.opcode {
        Opcode::Mov => {
            let dest = insn.register(0)?;
            match insn.value(1)? {
                Operand::Register(src) if *src == dest => {}
                Operand::Register(src) => e.copy_num(*src, &[dest]),
                Operand::Immediate(value) => e.set_num(dest, *value as i128),
                Operand::Label(_) => unreachable_operand(insn)?,
            }
        }
        Opcode::Add => lower_add_sub(e, insn, false)?,
        Opcode::Sub => lower_add_sub(e, insn, true)?,
        Opcode::Neg => e.negate_num(insn.register(0)?),
        Opcode::BinaryNot => e.binary_not_num(insn.register(0)?),
        Opcode::Less => lower_less(e, insn)?,
        Opcode::Eq => lower_eq(e, insn)?,
        Opcode::LogicNot => {
            let dest = insn.register(0)?;
            let low = e.layout().bool_byte(dest);
            let result = e.temp();
            e.copy_byte(low, &[result.offset()]);
            e.logic_not_byte(result.offset());
            write_bool(e, dest, result.offset());
        }
        Opcode::LogicAnd | Opcode::LogicOr => lower_logic(e, insn)?,
        Opcode::Load => {
            let dest = insn.register(0)?;
            let address = address_source(insn, 1)?;
            let slot = e.layout().heap_value();
            e.load_memory(address, dest, slot);
        }
        Opcode::Store => {
            let address = address_source(insn, 0)?;
            let value = value_source(insn.value(1)?);
            let slot = e.layout().heap_value();
            e.store_memory(address, value, slot);
        }
        Opcode::Push => push(e, value_source(insn.value(0)?)),
        Opcode::Pop => {
            let dest = insn.register(0)?;
            let sp = e.layout().stack_pointer();
            let slot = e.layout().stack_value();
            e.increment_num(sp, -1);
            e.load_memory(Source::Register(sp), dest, slot);
        }
        Opcode::Read => {
            let dest = insn.register(0)?;
            let low = e.layout().bool_byte(dest);
            e.clear_num(dest);
            e.input_byte(low);
        }
        Opcode::Write => match insn.value(0)? {
            Operand::Register(src) => {
                let low = e.layout().bool_byte(*src);
                e.output_byte(low);
            }
            Operand::Immediate(value) => {
                let staged = e.temp();
                let byte = low_digit(e, *value);
                e.set_byte(staged.offset(), byte);
                e.output_byte(staged.offset());
            }
            Operand::Label(_) => unreachable_operand(insn)?,
        },
        Opcode::Label => e.goto_block(1),
        Opcode::Jmp => {
            let distance = label_distance(program, insn, insn.label(0)?)?;
            e.goto_block(distance);
        }
        Opcode::Jnz => {
            let distance = label_distance(program, insn, insn.label(1)?)?;
            match insn.value(0)? {
                Operand::Immediate(value) => {
                    let taken = e.layout().config().wrap(*value as i128) != 0;
                    e.goto_block(if taken { distance } else { 1 });
                }
                Operand::Register(cond) => {
                    let cur_cmd = e.layout().cur_cmd();
                    e.set_num(cur_cmd, 1);
                    let nonzero = e.temp();
                    e.num_is_nonzero(*cond, nonzero.offset());
                    e.if_byte(nonzero.offset(), |e| e.set_num(cur_cmd, distance));
                    e.basic_block_end();
                }
                Operand::Label(_) => unreachable_operand(insn)?,
            }
        }
        Opcode::Call => {
            let distance = label_distance(program, insn, insn.label(0)?)?;
            push(e, Source::Immediate(insn.block as i64 + 1));
            e.goto_block(distance);
        }
        Opcode::Ret => lower_ret(e, program, insn),
    }
    Ok(())
}

fn unreachable_operand(insn: &Instruction) -> CompilerResult<()> {
    Err(CompilerError::internal(format!(
        "{}: unchecked operand in '{insn}'",
        insn.location
    )))
}

/// Book a temporary holding a copy of `operand`
fn force_temp(e: &mut Emitter, operand: &Operand) -> Temp {
    let temp = e.temp();
    match operand {
        Operand::Register(src) => e.copy_num(*src, &[temp.offset()]),
        Operand::Immediate(value) => e.set_num(temp.offset(), *value as i128),
        // rejected by the frontend; an empty temporary is harmless here
        Operand::Label(_) => e.clear_num(temp.offset()),
    }
    temp
}

/// Registers are used in place; immediates are staged in a temporary
fn operand_slot(e: &mut Emitter, operand: &Operand) -> (isize, Option<Temp>) {
    match operand {
        Operand::Register(src) => (*src, None),
        _ => {
            let temp = force_temp(e, operand);
            (temp.offset(), Some(temp))
        }
    }
}

fn value_source(operand: &Operand) -> Source {
    match operand {
        Operand::Register(src) => Source::Register(*src),
        Operand::Immediate(value) => Source::Immediate(*value),
        Operand::Label(_) => Source::Immediate(0),
    }
}

fn address_source(insn: &Instruction, index: usize) -> CompilerResult<Source> {
    match insn.value(index)? {
        Operand::Immediate(address) if *address < 0 => Err(CompilerError::semantic(
            format!("memory address {address} is negative"),
            insn.location.clone(),
        )),
        operand => Ok(value_source(operand)),
    }
}

/// Least significant cell of an immediate, the part boolean and I/O opcodes look at
fn low_digit(e: &Emitter, value: i64) -> u32 {
    e.layout()
        .config()
        .digits(value as i128)
        .last()
        .copied()
        .unwrap_or(0)
}

/// Store a 0/1 byte into `dest` as a whole num, consuming `byte`
fn write_bool(e: &mut Emitter, dest: isize, byte: isize) {
    e.clear_num(dest);
    let low = e.layout().bool_byte(dest);
    e.move_byte(byte, &[low]);
}

fn label_distance(program: &Program, insn: &Instruction, name: &str) -> CompilerResult<i128> {
    let target = program
        .label_block(name)
        .ok_or_else(|| CompilerError::semantic(format!("undefined label '{name}'"), insn.location.clone()))?;
    Ok(block_distance(insn.block, target, program.exit_block()))
}

fn push(e: &mut Emitter, value: Source) {
    let sp = e.layout().stack_pointer();
    let slot = e.layout().stack_value();
    e.store_memory(Source::Register(sp), value, slot);
    e.increment_num(sp, 1);
}

fn lower_add_sub(e: &mut Emitter, insn: &Instruction, subtract: bool) -> CompilerResult<()> {
    let dest = insn.register(0)?;
    let a = insn.value(1)?;
    let b = insn.value(2)?;
    let sign: i128 = if subtract { -1 } else { 1 };
    match (a, b) {
        (Operand::Immediate(x), Operand::Immediate(y)) => {
            e.set_num(dest, *x as i128 + sign * *y as i128);
        }
        (Operand::Register(r), Operand::Immediate(y)) if *r == dest => {
            e.increment_num(dest, sign * *y as i128);
        }
        (Operand::Immediate(x), Operand::Register(r)) if *r == dest => {
            if subtract {
                e.negate_num(dest);
            }
            e.increment_num(dest, *x as i128);
        }
        _ => {
            let left = force_temp(e, a);
            let right = force_temp(e, b);
            e.move_num(left.offset(), &[dest]);
            if subtract {
                e.sub_num(dest, right.offset());
            } else {
                e.add_num(dest, right.offset());
            }
        }
    }
    Ok(())
}

fn lower_less(e: &mut Emitter, insn: &Instruction) -> CompilerResult<()> {
    let dest = insn.register(0)?;
    let a = insn.value(1)?;
    let b = insn.value(2)?;
    if let (Operand::Immediate(x), Operand::Immediate(y)) = (a, b) {
        let config = e.layout().config();
        let signed = |v: i64| config.to_signed(config.wrap(v as i128));
        let less = signed(*x) < signed(*y);
        e.set_num(dest, less as i128);
        return Ok(());
    }
    let left = force_temp(e, a);
    let right = force_temp(e, b);
    e.bias_num(left.offset());
    e.bias_num(right.offset());
    let result = e.temp();
    e.less_num(left.offset(), right.offset(), result.offset());
    write_bool(e, dest, result.offset());
    Ok(())
}

fn lower_eq(e: &mut Emitter, insn: &Instruction) -> CompilerResult<()> {
    let dest = insn.register(0)?;
    let a = insn.value(1)?;
    let b = insn.value(2)?;
    if let (Operand::Immediate(x), Operand::Immediate(y)) = (a, b) {
        let config = e.layout().config();
        let equal = config.wrap(*x as i128) == config.wrap(*y as i128);
        e.set_num(dest, equal as i128);
        return Ok(());
    }
    let (left, _left_guard) = operand_slot(e, a);
    let (right, _right_guard) = operand_slot(e, b);
    let result = e.temp();
    e.equal_num(left, right, result.offset());
    write_bool(e, dest, result.offset());
    Ok(())
}

fn lower_logic(e: &mut Emitter, insn: &Instruction) -> CompilerResult<()> {
    let dest = insn.register(0)?;
    let a = insn.value(1)?;
    let b = insn.value(2)?;
    let is_and = insn.opcode == Opcode::LogicAnd;
    if let (Operand::Immediate(x), Operand::Immediate(y)) = (a, b) {
        let (x, y) = (low_digit(e, *x) != 0, low_digit(e, *y) != 0);
        let value = if is_and { x && y } else { x || y };
        e.set_num(dest, value as i128);
        return Ok(());
    }
    let (left, _left_guard) = bool_operand(e, a);
    let (right, _right_guard) = bool_operand(e, b);
    let result = e.temp();
    if is_and {
        e.logic_and_bytes(left, right, result.offset());
    } else {
        e.logic_or_bytes(left, right, result.offset());
    }
    write_bool(e, dest, result.offset());
    Ok(())
}

/// Boolean byte of a register, or an immediate's low cell staged in a temporary
fn bool_operand(e: &mut Emitter, operand: &Operand) -> (isize, Option<Temp>) {
    match operand {
        Operand::Register(src) => (e.layout().bool_byte(*src), None),
        Operand::Immediate(value) => {
            let temp = e.temp();
            let byte = low_digit(e, *value);
            e.set_byte(temp.offset(), byte);
            (temp.offset(), Some(temp))
        }
        Operand::Label(_) => {
            let temp = e.temp();
            e.clear_byte(temp.offset());
            (temp.offset(), Some(temp))
        }
    }
}

/// Pop the return block and turn it into a dispatch distance from here
fn lower_ret(e: &mut Emitter, program: &Program, insn: &Instruction) {
    let current = insn.block as i128;
    let exit = program.exit_block() as i128;
    let sp = e.layout().stack_pointer();
    let slot = e.layout().stack_value();
    let cur_cmd = e.layout().cur_cmd();

    e.increment_num(sp, -1);
    let target = e.temp();
    let t = target.offset();
    e.load_memory(Source::Register(sp), t, slot);

    let forward = e.temp();
    let f = forward.offset();
    {
        let here = e.temp();
        e.set_num(here.offset(), current);
        e.less_num(here.offset(), t, f);
    }
    e.if_else_byte(
        f,
        |e| e.increment_num(t, -current),
        |e| e.increment_num(t, exit - current + 1),
    );
    e.move_num(t, &[cur_cmd]);
    e.basic_block_end();
}

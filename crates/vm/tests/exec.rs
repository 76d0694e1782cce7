use types::{ExecutableImage, Opcode};
use vm::cpu::{Cpu, CpuFault, SliceExit, StepOutcome};
use vm::memory::{MemoryManager, Segment};
use vm::metering::{NoopMeter, QuantumMeter};
use vm::registers::Registers;

fn assemble(words: &[(Opcode, u16)]) -> Vec<u8> {
    words.iter().flat_map(|(op, arg)| op.encode(*arg)).collect()
}

fn load(mm: &mut MemoryManager, code: &[u8], data_len: usize) -> Segment {
    let seg = mm.allocate(code.len() + data_len).unwrap();
    mm.fill(seg, 0).unwrap();
    mm.write_slice(seg, seg.base(), code).unwrap();
    seg
}

#[test]
fn arithmetic_through_data_slots() {
    // acc = 6; M[21] = acc; acc = 7; acc *= M[21]; acc -= 2; PRINT; HALT
    let code = assemble(&[
        (Opcode::LoadI, 6),
        (Opcode::Store, 21),
        (Opcode::LoadI, 7),
        (Opcode::Mul, 21),
        (Opcode::SubI, 2),
        (Opcode::Print, 0),
        (Opcode::Halt, 0),
    ]);
    let mut mm = MemoryManager::new(64);
    let _pad = mm.allocate(5).unwrap();
    let seg = load(&mut mm, &code, 1);

    let mut cpu = Cpu::new(Registers::new());
    let slice = cpu.run_slice(&mut mm, seg, &mut NoopMeter);
    assert_eq!(slice.outputs, vec![40]);
    assert_eq!(slice.exit, SliceExit::Halted);
    assert_eq!(slice.executed, 7);
    assert_eq!(mm.read(seg, seg.base() + 21).unwrap(), 6);
}

#[test]
fn countdown_loop_with_jz() {
    // acc = 3; loop: JZ end; PRINT; SUBI 1; JMP loop; end: HALT
    let code = assemble(&[
        (Opcode::LoadI, 3),
        (Opcode::Jz, 15),
        (Opcode::Print, 0),
        (Opcode::SubI, 1),
        (Opcode::Jmp, 3),
        (Opcode::Halt, 0),
    ]);
    let mut mm = MemoryManager::new(32);
    let seg = load(&mut mm, &code, 0);
    let mut cpu = Cpu::new(Registers::new());
    let slice = cpu.run_slice(&mut mm, seg, &mut NoopMeter);
    assert_eq!(slice.outputs, vec![3, 2, 1]);
    assert_eq!(slice.exit, SliceExit::Halted);
}

#[test]
fn quantum_preempts_between_instructions() {
    let code = assemble(&[
        (Opcode::LoadI, 1),
        (Opcode::Print, 0),
        (Opcode::LoadI, 2),
        (Opcode::Print, 0),
        (Opcode::Halt, 0),
    ]);
    let mut mm = MemoryManager::new(32);
    let seg = load(&mut mm, &code, 0);
    let mut cpu = Cpu::new(Registers::new());

    let first = cpu.run_slice(&mut mm, seg, &mut QuantumMeter::new(3));
    assert_eq!(first.exit, SliceExit::Preempted);
    assert_eq!(first.outputs, vec![1]);
    assert_eq!(cpu.registers().pc, 9);

    // resume from saved registers, as a context switch would
    let mut resumed = Cpu::new(cpu.registers());
    let second = resumed.run_slice(&mut mm, seg, &mut QuantumMeter::new(3));
    assert_eq!(second.outputs, vec![2]);
    assert_eq!(second.exit, SliceExit::Halted);
}

#[test]
fn store_outside_segment_faults() {
    let code = assemble(&[(Opcode::LoadI, 1), (Opcode::Store, 200), (Opcode::Halt, 0)]);
    let mut mm = MemoryManager::new(256);
    let seg = load(&mut mm, &code, 0);
    let _victim = mm.allocate(100).unwrap();

    let mut cpu = Cpu::new(Registers::new());
    let slice = cpu.run_slice(&mut mm, seg, &mut NoopMeter);
    match slice.exit {
        SliceExit::Faulted(CpuFault::Segmentation { pc, addr, .. }) => {
            assert_eq!(pc, 3);
            assert_eq!(addr, 200);
        }
        other => panic!("expected segmentation fault, got {:?}", other),
    }
    assert_eq!(mm.peek(200), Some(0));
}

#[test]
fn running_off_the_end_faults_on_fetch() {
    let code = assemble(&[(Opcode::Nop, 0)]);
    let mut mm = MemoryManager::new(16);
    let seg = load(&mut mm, &code, 0);
    let mut cpu = Cpu::new(Registers::new());
    assert_eq!(cpu.step(&mut mm, seg), Ok(StepOutcome::Continue));
    assert!(matches!(cpu.step(&mut mm, seg), Err(CpuFault::Segmentation { pc: 3, .. })));
}

#[test]
fn word_straddling_the_segment_end_faults() {
    let mut mm = MemoryManager::new(70_000);
    let seg = mm.allocate(65_536).unwrap();
    mm.fill(seg, 0).unwrap();
    mm.write_slice(seg, seg.base(), &Opcode::Jmp.encode(65_535)).unwrap();
    mm.write(seg, seg.base() + 65_535, Opcode::Jmp.as_byte()).unwrap();

    let mut cpu = Cpu::new(Registers::new());
    let slice = cpu.run_slice(&mut mm, seg, &mut NoopMeter);
    assert_eq!(slice.executed, 1);
    assert_eq!(
        slice.exit,
        SliceExit::Faulted(CpuFault::Segmentation {
            pc: 65_535,
            addr: seg.base() + 65_536,
            base: seg.base(),
            limit: seg.limit(),
        })
    );
}

#[test]
fn pc_past_the_last_addressable_word_faults() {
    let mut mm = MemoryManager::new(70_000);
    let seg = mm.allocate(65_536).unwrap();
    mm.fill(seg, 0).unwrap();
    mm.write_slice(seg, seg.base(), &Opcode::Jmp.encode(65_533)).unwrap();
    mm.write_slice(seg, seg.base() + 65_533, &Opcode::Nop.encode(0)).unwrap();

    let mut cpu = Cpu::new(Registers::new());
    assert_eq!(cpu.step(&mut mm, seg), Ok(StepOutcome::Continue));
    assert_eq!(cpu.registers().pc, 65_533);
    assert!(matches!(
        cpu.step(&mut mm, seg),
        Err(CpuFault::Segmentation { pc: 65_533, .. })
    ));
    assert_eq!(cpu.registers().pc, 65_533);
}

#[test]
fn unknown_opcode_is_illegal_instruction() {
    let mut mm = MemoryManager::new(16);
    let seg = load(&mut mm, &[0xee, 0, 0], 0);
    let mut cpu = Cpu::new(Registers::new());
    assert_eq!(
        cpu.step(&mut mm, seg),
        Err(CpuFault::IllegalInstruction { pc: 0, opcode: 0xee })
    );
}

#[test]
fn compiled_image_runs_on_bare_cpu() {
    let output = compiler::compile("LET x = 4 PRINT x * x + 1 HALT");
    let image: ExecutableImage = output.image.expect("program compiles");
    let mut mm = MemoryManager::new(256);
    let seg = load(&mut mm, image.code(), image.data_len() as usize);
    let mut cpu = Cpu::new(Registers::new());
    let slice = cpu.run_slice(&mut mm, seg, &mut NoopMeter);
    assert_eq!(slice.outputs, vec![17]);
    assert_eq!(slice.exit, SliceExit::Halted);
}

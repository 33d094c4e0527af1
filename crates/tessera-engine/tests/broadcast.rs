use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use tessera_arena::ArrayArena;
use tessera_core::{ArrayError, Value};
use tessera_engine::{Engine, EngineConfig, Kernel, Operand, Slot};
use tessera_test_utils::fixtures::{ints, iota, masked_iota};
use tessera_test_utils::{float64, int32};
use tessera_view::{Boundary, ViewBuilder};

struct Counting(AtomicUsize);

impl Kernel for Counting {
    fn call(&self, _index: usize, _slots: &mut [Slot<'_>]) -> Result<(), ArrayError> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn add(args: &[Value]) -> Value {
    Value::Int(args.iter().filter_map(Value::as_i64).sum())
}

fn positions(bits: &[bool]) -> Vec<usize> {
    bits.iter()
        .enumerate()
        .filter_map(|(i, &b)| b.then_some(i))
        .collect()
}

proptest! {
    #[test]
    fn scalar_and_two_arrays_run_n_times(n in 2usize..200) {
        let arena = ArrayArena::default();
        let s = arena.scalar(int32(), Value::Int(1)).unwrap();
        let a = iota(&arena, &[n], int32());
        let out = arena.entity(&[n], int32()).unwrap();
        let kernel = Counting(AtomicUsize::new(0));
        let ops = [Operand::read(s), Operand::read(a), Operand::write(out)];
        let metrics = Engine::default().run_kernel(&arena, &kernel, &ops).unwrap();
        prop_assert_eq!(kernel.0.load(Ordering::Relaxed), n);
        prop_assert_eq!(metrics.iterations, n as u64);
    }

    #[test]
    fn mismatched_lengths_never_call(n in 2usize..50, m in 2usize..50) {
        prop_assume!(n != m);
        let arena = ArrayArena::default();
        let a = iota(&arena, &[n], int32());
        let b = iota(&arena, &[m], int32());
        let kernel = Counting(AtomicUsize::new(0));
        let result = Engine::default().run_kernel(&arena, &kernel, &[Operand::read(a), Operand::read(b)]);
        let is_mismatch = matches!(result, Err(ArrayError::ShapeMismatch { .. }));
        prop_assert!(is_mismatch);
        prop_assert_eq!(kernel.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn result_mask_is_or_of_inputs(
        (a_bits, b_bits) in (1usize..40).prop_flat_map(|n| {
            (prop::collection::vec(any::<bool>(), n), prop::collection::vec(any::<bool>(), n))
        })
    ) {
        let n = a_bits.len();
        let arena = ArrayArena::default();
        let a = masked_iota(&arena, &[n], int32(), &positions(&a_bits));
        let b = masked_iota(&arena, &[n], int32(), &positions(&b_bits));
        let out = arena.entity(&[n], int32()).unwrap();
        let metrics = Engine::default().run_map(&arena, add, &[a, b], out).unwrap();
        let mut skipped = 0;
        for i in 0..n {
            let expected = a_bits[i] || b_bits[i];
            prop_assert_eq!(arena.is_masked(out, i).unwrap(), expected);
            skipped += usize::from(expected);
        }
        prop_assert_eq!(metrics.masked_skips, skipped as u64);
        prop_assert_eq!(metrics.iterations, (n - skipped) as u64);
    }
}

#[test]
fn parallel_run_matches_sequential() {
    let n = 1000;
    let arena = ArrayArena::default();
    let a = iota(&arena, &[n], float64());
    let s = arena.scalar(float64(), Value::Float(0.5)).unwrap();
    let out = arena.entity(&[n], float64()).unwrap();
    let engine = Engine::new(EngineConfig {
        worker_count: Some(4),
        parallel_threshold: 16,
    })
    .unwrap();
    let metrics = engine
        .run_map(
            &arena,
            |v| Value::Float(v[0].as_f64().unwrap_or(0.0) * v[1].as_f64().unwrap_or(0.0)),
            &[a, s],
            out,
        )
        .unwrap();
    assert_eq!(metrics.workers, 4);
    assert_eq!(metrics.iterations, n as u64);
    for i in [0, 1, 249, 250, 251, 999] {
        assert_eq!(arena.fetch(out, i).unwrap(), Value::Float(i as f64 * 0.5));
    }
}

#[test]
fn broadcast_output_stays_sequential() {
    let arena = ArrayArena::default();
    let a = iota(&arena, &[100], int32());
    let acc = arena.scalar(int32(), Value::Int(0)).unwrap();
    let engine = Engine::new(EngineConfig {
        worker_count: Some(4),
        parallel_threshold: 1,
    })
    .unwrap();
    struct Sum;
    impl Kernel for Sum {
        fn call(&self, _index: usize, slots: &mut [Slot<'_>]) -> Result<(), ArrayError> {
            let x = slots[0].value().as_i64().unwrap_or(0);
            let total = slots[1].value().as_i64().unwrap_or(0);
            slots[1].set(&Value::Int(total + x))
        }
    }
    let metrics = engine
        .run_kernel(&arena, &Sum, &[Operand::read(a), Operand::read_write(acc)])
        .unwrap();
    assert_eq!(metrics.workers, 1);
    assert_eq!(arena.fetch(acc, 0).unwrap(), Value::Int(4950));
}

#[test]
fn view_operands_are_synced_and_detached() {
    let arena = ArrayArena::default();
    let dest = arena.entity(&[2, 4], int32()).unwrap();
    let strided = arena.block(dest, &[0, 0], &[1, 2], &[2, 2]).unwrap();
    let src = iota(&arena, &[4], int32());
    let one = arena.scalar(int32(), Value::Int(1)).unwrap();
    Engine::default()
        .run_map(&arena, add, &[src, one], strided)
        .unwrap();
    assert_eq!(
        ints(&arena, dest),
        vec![Some(1), Some(0), Some(2), Some(0), Some(3), Some(0), Some(4), Some(0)]
    );
    assert!(!arena.is_attached(strided).unwrap());
    assert_eq!(arena.attach_depth(strided).unwrap(), 0);
}

#[test]
fn masked_window_input_masks_output() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[4], int32());
    let shifted = arena.window(p, &[-1], &[4], Boundary::Mask).unwrap();
    let out = arena.entity(&[4], int32()).unwrap();
    Engine::default()
        .run_map(&arena, add, &[shifted, p], out)
        .unwrap();
    assert_eq!(ints(&arena, out), vec![None, Some(1), Some(3), Some(5)]);
}

#[test]
fn sink_mask_cleared_when_inputs_unmasked() {
    let arena = ArrayArena::default();
    let a = iota(&arena, &[3], int32());
    let out = masked_iota(&arena, &[3], int32(), &[0, 2]);
    Engine::default().run_map(&arena, add, &[a], out).unwrap();
    assert_eq!(arena.count_masked(out).unwrap(), 0);
    assert_eq!(ints(&arena, out), vec![Some(0), Some(1), Some(2)]);
}

#[test]
fn read_only_view_output_rejected() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[1, 3], int32());
    let tiled = arena.repeat(p, &[2, 0]).unwrap();
    let a = iota(&arena, &[6], int32());
    assert!(matches!(
        Engine::default().run_map(&arena, add, &[a], tiled),
        Err(ArrayError::ReadOnly { .. })
    ));
}

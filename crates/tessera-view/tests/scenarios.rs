use tessera_arena::ArrayArena;
use tessera_core::{ArrayError, BuiltinKind, Value};
use tessera_test_utils::fixtures::{ints, iota};
use tessera_test_utils::int32;
use tessera_view::{Block, Boundary, GridAxis, ViewBuilder};

#[test]
fn block_with_step_picks_strided_elements() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[4, 4], int32());
    let v = arena.block(p, &[1, 0], &[1, 2], &[2, 2]).unwrap();
    assert_eq!(arena.shape(v).unwrap().as_slice(), &[2, 2]);
    assert_eq!(ints(&arena, v), vec![Some(4), Some(6), Some(8), Some(10)]);
    for (view_idx, parent_idx) in [([0, 0], [1, 0]), ([0, 1], [1, 2]), ([1, 0], [2, 0]), ([1, 1], [2, 2])] {
        assert_eq!(
            arena.fetch_index(v, &view_idx).unwrap(),
            arena.fetch_index(p, &parent_idx).unwrap()
        );
    }
}

#[test]
fn select_by_flags_compacts() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[5], int32());
    let v = arena.select(p, &[false, true, false, true, true]).unwrap();
    assert_eq!(arena.element_count(v).unwrap(), 3);
    assert_eq!(arena.fetch(v, 1).unwrap(), arena.fetch(p, 3).unwrap());
    assert!(matches!(
        arena.select(p, &[true; 4]),
        Err(ArrayError::ShapeMismatch { expected: 5, received: 4 })
    ));
}

#[test]
fn masked_parent_gives_view_a_mirrored_mask() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[4, 4], int32());
    arena.create_mask(p).unwrap();
    arena.set_masked(p, 4, true).unwrap();
    let v = arena.block(p, &[1, 0], &[1, 2], &[2, 2]).unwrap();

    assert!(arena.has_mask(v).unwrap());
    let m = arena.mask_of(v).unwrap().expect("mask materialized by has_mask");
    assert_eq!(arena.kind_tag(m).unwrap(), BuiltinKind::Block.tag());
    assert_eq!(arena.parent(m).unwrap(), arena.mask_of(p).unwrap());
    let view_params = arena.with_kind::<Block, _>(v, Block::clone).unwrap();
    let mask_params = arena.with_kind::<Block, _>(m, Block::clone).unwrap();
    assert_eq!(view_params, mask_params);

    assert_eq!(ints(&arena, v), vec![None, Some(6), Some(8), Some(10)]);

    arena.set_masked(v, 3, true).unwrap();
    assert!(arena.is_masked(p, 10).unwrap());
}

#[test]
fn repeat_is_read_only() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[1, 5], int32());
    let v = arena.repeat(p, &[3, 0]).unwrap();
    assert_eq!(arena.shape(v).unwrap().as_slice(), &[3, 5]);
    assert!(arena.is_read_only(v).unwrap());
    assert!(matches!(
        arena.store(v, 0, &Value::Int(1)),
        Err(ArrayError::ReadOnly { .. })
    ));
    assert_eq!(arena.fetch_index(v, &[2, 4]).unwrap(), Value::Int(4));
}

#[test]
fn nested_attach_keeps_view_attached() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[6], int32());
    let v = arena.refer(p, 0, 2, &[3]).unwrap();
    arena.attach(v).unwrap();
    arena.attach(v).unwrap();
    arena.detach(v).unwrap();
    assert!(arena.is_attached(v).unwrap());
    arena.detach(v).unwrap();
    assert!(!arena.is_attached(v).unwrap());
}

#[test]
fn writes_flow_through_a_view_chain() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[2, 3], int32());
    let t = arena.transpose(p).unwrap();
    let b = arena.block(t, &[1, 0], &[1, 1], &[2, 2]).unwrap();
    {
        let guard = arena.attach_scope(b).unwrap();
        arena.store_index(b, &[0, 1], &Value::Int(99)).unwrap();
        guard.sync().unwrap();
    }
    // b[0,1] = t[1,1] = p[1,1]
    assert_eq!(arena.fetch_index(p, &[1, 1]).unwrap(), Value::Int(99));
    assert!(!arena.is_attached(t).unwrap());
}

#[test]
fn window_mask_boundary_reads_undefined() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[3], int32());
    let w = arena.window(p, &[-1], &[3], Boundary::Mask).unwrap();
    assert_eq!(ints(&arena, w), vec![None, Some(0), Some(1)]);
    assert_eq!(arena.count_masked(w).unwrap(), 1);

    let clamp = arena.window(p, &[1], &[4], Boundary::Clamp).unwrap();
    assert_eq!(ints(&arena, clamp), vec![Some(1), Some(2), Some(2), Some(2)]);

    let fill = arena.window(p, &[2], &[2], Boundary::Fill(Value::Int(-1))).unwrap();
    assert_eq!(ints(&arena, fill), vec![Some(2), Some(-1)]);
    assert_eq!(arena.count_masked(fill).unwrap(), 0);
}

#[test]
fn grid_with_masked_index_list() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[3, 2], int32());
    let axis = GridAxis::masked(vec![2, 0, -1], vec![false, true, false]).unwrap();
    let g = arena.grid(p, vec![Some(axis), None]).unwrap();
    assert_eq!(arena.shape(g).unwrap().as_slice(), &[3, 2]);
    assert_eq!(
        ints(&arena, g),
        vec![Some(4), Some(5), None, None, Some(4), Some(5)]
    );
}

#[test]
fn view_of_released_parent_is_refused() {
    let arena = ArrayArena::default();
    let p = iota(&arena, &[4], int32());
    let v = arena.refer(p, 0, 1, &[2, 2]).unwrap();
    assert!(matches!(arena.release(p), Err(ArrayError::InUse { .. })));
    arena.release(v).unwrap();
    arena.release(p).unwrap();
    assert!(matches!(
        arena.fetch(v, 0),
        Err(ArrayError::StaleHandle { .. })
    ));
}

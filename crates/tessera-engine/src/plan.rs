//! Iteration planning: broadcast length, strides and operand aliasing.
//!
//! Planning is pure: it looks only at operand headers, so every shape and
//! aliasing error surfaces before any array is attached or any kernel
//! call is made.

use tessera_core::{ArrayError, ArrayId, ElementType};

use crate::operand::Access;

/// Largest number of operands a kernel run accepts.
pub const MAX_OPERANDS: usize = 7;

/// Header facts about one operand.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OperandInfo {
    pub(crate) id: ArrayId,
    pub(crate) access: Access,
    pub(crate) count: usize,
    pub(crate) elem: ElementType,
}

/// How one operand is stepped through the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Lane {
    /// Index into [`Plan::distinct`].
    pub(crate) slot: usize,
    /// Elements advanced per iteration: 0 for broadcast scalars, else 1.
    pub(crate) stride: usize,
    pub(crate) elem: ElementType,
    pub(crate) access: Access,
    /// Reads a pre-loop copy because another operand writes the array.
    pub(crate) snapshot: bool,
}

/// The resolved iteration.
#[derive(Clone, Debug)]
pub(crate) struct Plan {
    pub(crate) len: usize,
    /// One per operand, in operand order.
    pub(crate) lanes: Vec<Lane>,
    /// Distinct arrays, in first-seen order.
    pub(crate) distinct: Vec<ArrayId>,
    /// Per distinct array: some operand writes it.
    pub(crate) written: Vec<bool>,
}

impl Plan {
    pub(crate) fn build(operands: &[OperandInfo]) -> Result<Self, ArrayError> {
        if operands.is_empty() || operands.len() > MAX_OPERANDS {
            return Err(ArrayError::InvalidConfig {
                reason: format!(
                    "a kernel run takes 1..={MAX_OPERANDS} operands, got {}",
                    operands.len()
                ),
            });
        }
        if let Some(host) = operands.iter().find(|op| op.elem.is_host()) {
            return Err(ArrayError::UnsupportedElement {
                kind: host.elem.kind(),
                operation: "broadcast iteration",
            });
        }

        let len = operands
            .iter()
            .filter(|op| op.count != 1)
            .map(|op| op.count)
            .max()
            .unwrap_or(1);
        if let Some(bad) = operands.iter().find(|op| op.count != 1 && op.count != len) {
            return Err(ArrayError::ShapeMismatch {
                expected: len,
                received: bad.count,
            });
        }

        let mut distinct: Vec<ArrayId> = Vec::with_capacity(operands.len());
        let mut written: Vec<bool> = Vec::with_capacity(operands.len());
        let mut lanes = Vec::with_capacity(operands.len());
        for op in operands {
            let slot = match distinct.iter().position(|&id| id == op.id) {
                Some(slot) => slot,
                None => {
                    distinct.push(op.id);
                    written.push(false);
                    distinct.len() - 1
                }
            };
            if op.access.writes() {
                if written[slot] {
                    return Err(ArrayError::AliasedOutput { array: op.id });
                }
                written[slot] = true;
            }
            lanes.push(Lane {
                slot,
                stride: usize::from(op.count != 1),
                elem: op.elem,
                access: op.access,
                snapshot: false,
            });
        }
        for lane in &mut lanes {
            lane.snapshot = !lane.access.writes() && written[lane.slot];
        }

        Ok(Self {
            len,
            lanes,
            distinct,
            written,
        })
    }

    /// Whether some written operand is a scalar broadcast over more than
    /// one index.
    pub(crate) fn broadcast_output(&self) -> bool {
        self.len > 1
            && self
                .lanes
                .iter()
                .any(|lane| lane.access.writes() && lane.stride == 0)
    }

    /// Whether the distinct array at `slot` needs a pre-loop snapshot.
    pub(crate) fn needs_snapshot(&self, slot: usize) -> bool {
        self.lanes.iter().any(|lane| lane.snapshot && lane.slot == slot)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tessera_core::ElementKind;

    use super::*;

    fn info(id: u32, access: Access, count: usize) -> OperandInfo {
        OperandInfo {
            id: ArrayId::new(id, 0),
            access,
            count,
            elem: ElementType::new(ElementKind::Float64),
        }
    }

    #[test]
    fn scalars_broadcast() {
        let plan = Plan::build(&[
            info(0, Access::Read, 1),
            info(1, Access::Read, 8),
            info(2, Access::Write, 8),
        ])
        .unwrap();
        assert_eq!(plan.len, 8);
        let strides: Vec<usize> = plan.lanes.iter().map(|l| l.stride).collect();
        assert_eq!(strides, vec![0, 1, 1]);
        assert!(!plan.broadcast_output());
    }

    #[test]
    fn all_scalars_run_once() {
        let plan = Plan::build(&[info(0, Access::Read, 1), info(1, Access::Write, 1)]).unwrap();
        assert_eq!(plan.len, 1);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        assert!(matches!(
            Plan::build(&[info(0, Access::Read, 4), info(1, Access::Write, 5)]),
            Err(ArrayError::ShapeMismatch { expected: 5, received: 4 })
        ));
    }

    #[test]
    fn operand_count_bounded() {
        assert!(Plan::build(&[]).is_err());
        let many: Vec<OperandInfo> = (0..8).map(|i| info(i, Access::Read, 3)).collect();
        assert!(matches!(
            Plan::build(&many),
            Err(ArrayError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn duplicate_reads_share_one_array() {
        let plan = Plan::build(&[
            info(0, Access::Read, 3),
            info(0, Access::Read, 3),
            info(1, Access::Write, 3),
        ])
        .unwrap();
        assert_eq!(plan.distinct.len(), 2);
        assert_eq!(plan.lanes[0].slot, plan.lanes[1].slot);
        assert!(!plan.lanes[0].snapshot);
    }

    #[test]
    fn read_of_written_array_is_snapshotted() {
        let plan = Plan::build(&[info(0, Access::Read, 3), info(0, Access::Write, 3)]).unwrap();
        assert_eq!(plan.distinct.len(), 1);
        assert!(plan.lanes[0].snapshot);
        assert!(plan.needs_snapshot(0));
    }

    #[test]
    fn two_writes_to_one_array_rejected() {
        assert!(matches!(
            Plan::build(&[info(0, Access::ReadWrite, 3), info(0, Access::Write, 3)]),
            Err(ArrayError::AliasedOutput { .. })
        ));
    }

    #[test]
    fn broadcast_output_detected() {
        let plan = Plan::build(&[info(0, Access::Read, 4), info(1, Access::Write, 1)]).unwrap();
        assert!(plan.broadcast_output());
    }

    proptest! {
        #[test]
        fn length_is_max_non_scalar(n in 0usize..50, scalars in 0usize..4) {
            let mut ops: Vec<OperandInfo> = (0..scalars as u32).map(|i| info(i, Access::Read, 1)).collect();
            ops.push(info(10, Access::Read, n));
            ops.push(info(11, Access::Write, n));
            let plan = Plan::build(&ops).unwrap();
            prop_assert_eq!(plan.len, n);
            for (lane, op) in plan.lanes.iter().zip(&ops) {
                prop_assert_eq!(lane.stride, usize::from(op.count != 1));
            }
        }
    }
}

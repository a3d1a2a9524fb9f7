//! Topological ordering of passes by texture dependencies.
//!
//! A pass depends on every *other* pass that writes a texture it reads. The
//! bake is a depth-first search over passes in insertion order; producers are
//! visited before the pass that reads them, so the post-order is a valid
//! execution order. Writers of the same texture are visited in insertion
//! order, which makes the result deterministic.

use std::collections::HashMap;

use super::{PassId, TextureId};

/// The texture sets a pass declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PassIo {
    pub reads: Vec<TextureId>,
    pub writes: Vec<TextureId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders `passes` so that every producer precedes its consumers.
///
/// On a cycle, returns the pass whose dependencies led back to itself.
pub(crate) fn bake(passes: &[PassIo]) -> Result<Vec<PassId>, PassId> {
    let mut writers: HashMap<TextureId, Vec<usize>> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        for &texture in &pass.writes {
            writers.entry(texture).or_default().push(index);
        }
    }

    let mut marks = vec![Mark::Unvisited; passes.len()];
    let mut order = Vec::with_capacity(passes.len());
    for index in 0..passes.len() {
        visit(index, passes, &writers, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn visit(
    index: usize,
    passes: &[PassIo],
    writers: &HashMap<TextureId, Vec<usize>>,
    marks: &mut [Mark],
    order: &mut Vec<PassId>,
) -> Result<(), PassId> {
    match marks[index] {
        Mark::Done => return Ok(()),
        Mark::InProgress => return Err(PassId(index)),
        Mark::Unvisited => {}
    }

    marks[index] = Mark::InProgress;
    for texture in &passes[index].reads {
        let Some(producers) = writers.get(texture) else {
            continue;
        };
        for &producer in producers {
            if producer != index {
                visit(producer, passes, writers, marks, order)?;
            }
        }
    }
    marks[index] = Mark::Done;
    order.push(PassId(index));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io(reads: &[usize], writes: &[usize]) -> PassIo {
        PassIo {
            reads: reads.iter().map(|&t| TextureId(t)).collect(),
            writes: writes.iter().map(|&t| TextureId(t)).collect(),
        }
    }

    fn ids(order: &[PassId]) -> Vec<usize> {
        order.iter().map(|p| p.0).collect()
    }

    #[test]
    fn producers_precede_consumers() {
        // 0 reads t1 written by 2; 2 reads t2 written by 1.
        let passes = [io(&[1], &[0]), io(&[], &[2]), io(&[2], &[1])];
        assert_eq!(ids(&bake(&passes).unwrap()), [1, 2, 0]);
    }

    #[test]
    fn independent_passes_keep_insertion_order() {
        let passes = [io(&[], &[0]), io(&[], &[1]), io(&[], &[2])];
        assert_eq!(ids(&bake(&passes).unwrap()), [0, 1, 2]);
    }

    #[test]
    fn multiple_writers_visit_in_insertion_order() {
        let passes = [io(&[5], &[0]), io(&[], &[5]), io(&[], &[5])];
        assert_eq!(ids(&bake(&passes).unwrap()), [1, 2, 0]);
    }

    #[test]
    fn reading_own_output_is_not_a_cycle() {
        let passes = [io(&[0], &[0])];
        assert_eq!(ids(&bake(&passes).unwrap()), [0]);
    }

    #[test]
    fn two_pass_cycle_is_rejected() {
        let passes = [io(&[1], &[0]), io(&[0], &[1])];
        assert_eq!(bake(&passes), Err(PassId(0)));
    }

    #[test]
    fn diamond() {
        // 0 -> {1, 2} -> 3
        let passes = [
            io(&[], &[0]),
            io(&[0], &[1]),
            io(&[0], &[2]),
            io(&[1, 2], &[3]),
        ];
        assert_eq!(ids(&bake(&passes).unwrap()), [0, 1, 2, 3]);
    }
}

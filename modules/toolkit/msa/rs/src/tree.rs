use eyre::{ensure, Result};

use phyloalign_core_rs::progress::Monitor;
use phyloalign_core_rs::seq::Sequence;

/// Rooted binary guide tree over input sequence indices. The progressive
/// aligner only requires that the leaves are exactly the input indices, each
/// appearing once; how the tree is built (neighbor joining, UPGMA, anything
/// else) is the builder's business.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum GuideTree {
    Leaf(usize),
    Node(Box<GuideTree>, Box<GuideTree>),
}

impl GuideTree {
    pub fn node(left: GuideTree, right: GuideTree) -> Self {
        GuideTree::Node(Box::new(left), Box::new(right))
    }

    /// Leaf indices in left-to-right order.
    pub fn leaves(&self) -> Vec<usize> {
        let mut leaves = Vec::new();
        self.collect(&mut leaves);
        leaves
    }

    fn collect(&self, into: &mut Vec<usize>) {
        match self {
            GuideTree::Leaf(index) => into.push(*index),
            GuideTree::Node(left, right) => {
                left.collect(into);
                right.collect(into);
            }
        }
    }

    /// Check that the leaves are exactly `0..count`, each exactly once.
    pub fn validate(&self, count: usize) -> Result<()> {
        let leaves = self.leaves();
        ensure!(
            leaves.len() == count,
            "guide tree has {} leaves for {} sequences",
            leaves.len(),
            count
        );
        let mut seen = vec![false; count];
        for index in leaves {
            ensure!(index < count, "guide tree leaf {} is out of range", index);
            ensure!(!seen[index], "guide tree repeats leaf {}", index);
            seen[index] = true;
        }
        Ok(())
    }
}

/// External collaborator contract: clustering implementations produce the
/// guide tree the progressive aligner walks. Returns `None` on cancellation.
pub trait TreeBuilder {
    fn build(
        &self,
        sequences: &[Sequence],
        monitor: &mut Monitor<'_>,
    ) -> Result<Option<GuideTree>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_in_order() {
        let tree = GuideTree::node(
            GuideTree::node(GuideTree::Leaf(2), GuideTree::Leaf(0)),
            GuideTree::Leaf(1),
        );
        assert_eq!(tree.leaves(), vec![2, 0, 1]);
        assert!(tree.validate(3).is_ok());
    }

    #[test]
    fn validation_rejects_malformed_trees() {
        let repeated = GuideTree::node(GuideTree::Leaf(0), GuideTree::Leaf(0));
        assert!(repeated.validate(2).is_err());

        let out_of_range = GuideTree::node(GuideTree::Leaf(0), GuideTree::Leaf(5));
        assert!(out_of_range.validate(2).is_err());

        let missing = GuideTree::node(GuideTree::Leaf(0), GuideTree::Leaf(1));
        assert!(missing.validate(3).is_err());
        assert!(missing.validate(2).is_ok());
    }
}

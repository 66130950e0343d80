pub use distance::distance_matrix;
pub use progressive::Aligner;
pub use shuffle::significance;
pub use tree::{GuideTree, TreeBuilder};

pub mod distance;
pub mod progressive;
pub mod shuffle;
pub mod tree;

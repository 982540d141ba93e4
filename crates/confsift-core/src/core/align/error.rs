use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AssignmentError {
    #[error("Cost matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("Cost matrix contains a non-finite entry at ({row}, {col})")]
    NonFinite { row: usize, col: usize },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AlignError {
    #[error("Atom counts differ: reference has {reference}, target has {target}")]
    SizeMismatch { reference: usize, target: usize },

    #[error("No element-preserving permutation exists between the structures")]
    NoValidPermutation,

    #[error("Every candidate ordering changes the hydrogen-bond topology by more than {max}")]
    TopologyMismatch { max: usize },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    #[error("Fragment index {index} is out of range for {len} atoms")]
    InvalidFragment { index: usize, len: usize },

    #[error("Atom selections differ in size: reference has {reference}, target has {target}")]
    FragmentSizeMismatch { reference: usize, target: usize },

    #[error("Assignment failed: {0}")]
    Assignment(#[from] AssignmentError),
}

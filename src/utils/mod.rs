pub mod encoding;
pub mod matrix_params;
pub mod progress;

pub use matrix_params::{quote_path_with_matrix_params, MatrixParams};
pub use progress::{render_progress, TransferProgress};

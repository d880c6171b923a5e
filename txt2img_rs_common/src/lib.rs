//! Model source resolution shared by the txt2img_rs crates.

mod model_source;
mod progress;
mod tokens;

pub use model_source::*;
pub use progress::NiceProgressBar;
pub use tokens::{get_token, TokenSource};

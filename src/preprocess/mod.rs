//! Shared numeric preprocessing: fitted scalers, the fitted tokenizer and
//! image normalization. Everything here is pure and read-only after load.

pub mod image;
pub mod scaler;
pub mod tokenizer;

pub use self::image::{decode_upload, ImageTensor, MODEL_INPUT_SIZE};
pub use scaler::FittedScaler;
pub use tokenizer::{PaddingConfig, Side, TokenizerError, WordIndexTokenizer};

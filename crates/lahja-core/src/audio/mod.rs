//! WAV decode/encode helpers shared by the pipeline, the reference store,
//! and the daemon backend.

mod wav;

pub use wav::{decode_wav_bytes, encode_wav_bytes, OUTPUT_SAMPLE_RATE};

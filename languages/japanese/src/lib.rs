pub mod furigana;
pub mod readings;
pub mod script;
pub mod tokenizer;

pub use furigana::{FuriganaMapper, place_tokens};
pub use readings::{ReadingDictionary, ReadingEntry};
pub use tokenizer::ScriptTokenizer;

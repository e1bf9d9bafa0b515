//! Corpus file output.
//!
//! - [`delimited`]: reads and writes multi-character-separated corpus files
//!
//! # Output Structure
//!
//! ```text
//! corpus/
//! ├── nyt_data_1930_1.csv
//! ├── nyt_data_1930_2.csv
//! └── ...
//! all_nyt_data.csv          # merged corpus (path chosen by the caller)
//! ```

pub mod delimited;

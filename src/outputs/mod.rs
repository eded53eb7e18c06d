//! Output generation: CSV tables and the sentiment chart.
//!
//! # Submodules
//!
//! - [`tables`]: Writes the raw and scored record tables, and reads the scored one back
//! - [`chart`]: Renders the scored table as a grouped bar chart (SVG)
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── raw_ai_market_data.csv
//! ├── analyzed_ai_market_data.csv
//! └── sentiment_distribution.svg   # only after `chart`
//! ```

pub mod chart;
pub mod tables;

//! Reporting and plotting helpers.
//!
//! Plots are small functions turning attribution arrays into `plotly::Plot`
//! values; [`Report`] assembles them with maud into one standalone HTML page.
pub mod plots;
pub mod report;

pub use report::{Report, ReportSection};

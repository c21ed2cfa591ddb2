//! Data merger: reconcile a price series and an institutional-flow series into
//! one table on the price date axis.

pub mod merger;
pub mod pivot;
pub mod table;

pub use merger::{fetch_merged, merge_records, MergeError, MergeOutcome, MergeRequest};
pub use pivot::{pivot_net_flows, FlowPivot};
pub use table::{is_reserved_column, MergedBar, MergedTable, TableError};

/// Flow category the strategy keys on unless configured otherwise.
pub const DEFAULT_FLOW_CATEGORY: &str = "Foreign_Investor";

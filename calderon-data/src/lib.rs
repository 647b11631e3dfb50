//! Analytics over hydro-climatic series.
//!
//! Everything here is a pure function of already-decoded payloads from
//! `calderon-api`: no I/O, no shared state. Views recompute from scratch on
//! every fetch or filter change and throw the previous output away.
//!
//! - [`validity`]: which values count as present
//! - [`completeness`]: per-period counts, sums, averages and percentages
//! - [`correlation`]: pairwise Pearson correlation and scatter pairs
//! - [`rolling`]: trailing-window sums and means
//! - [`climatology`]: monthly normals, anomalies and multiannual summaries
//! - [`table`]: day/month filtering and pagination of daily records

pub mod climatology;
pub mod completeness;
pub mod correlation;
pub mod rolling;
pub mod table;
pub mod validity;

//! QA Panel
//!
//! A headless model of the quality-assurance panel: one row per check with
//! its name, annotation, status icon and optional fix button. The panel
//! drives the check engine only through its public surface (running checks,
//! reading and clearing cached results, lifecycle events) and can be
//! rendered by any front end from [`QaPanel::rows`] or [`QaPanel::to_json`].
//!
//! # Example
//!
//! ```ignore
//! let mut panel = QaPanel::default();
//! panel.set_checks(&mut workflows, &workflows.list_checks())?;
//! panel.run_all(&mut workflows, &mut ctx)?;
//! for row in panel.rows() {
//!     println!("{:?} {}", row.icon, row.text);
//! }
//! ```

mod panel;
mod row;

pub use panel::{PanelConfig, QaPanel};
pub use row::{CheckRow, StatusIcon};

//! Polling dashboard: read model and HTTP routes.

mod server;
mod view;

pub use server::{DashboardState, router, serve};
pub use view::{DashboardView, UsageSummary, build_view, status_date};

// engine/src/lib.rs
//
// The clinical operations engine: every stateful rule of the back office
// lives here, behind injected repository handles. The HTTP layer in
// rest_api is presentation glue over these services.

pub mod access;
pub mod aggregation;
pub mod appointments;
pub mod inventory;
pub mod notifications;
pub mod store;

pub use access::{AccessConfig, AccessService, Credentials, LoginProfile, WhoAmI};
pub use aggregation::{
    AggregationService, GroupCounts, RevenueBreakdown, TodaySnapshot, WindowQuery,
};
pub use appointments::{AppointmentFilter, AppointmentService};
pub use inventory::InventoryService;
pub use notifications::{EnrichedGroup, NotificationService};

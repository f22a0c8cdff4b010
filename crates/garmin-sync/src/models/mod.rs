pub mod activity;
pub mod metrics;

pub use activity::{
    parse_garmin_datetime, ActivitySummary, ActivityType, ActivityTypeTag, UNKNOWN_ACTIVITY_TYPE,
};
pub use metrics::ActivityMetrics;

pub mod activities;
pub mod daemon;
pub mod parse;
pub mod sync;

pub use activities::{list as list_activities, parse_date, show as show_activity};
pub use daemon::run as daemon;
pub use parse::parse_file;
pub use sync::{run as sync_run, status as sync_status};

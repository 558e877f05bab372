mod format;
mod json;
mod remote;
mod session;

pub(crate) use json::print_json;
pub(crate) use remote::{print_history, print_pest, print_prediction, print_weather};
pub(crate) use session::{print_session_counts, print_session_detail, print_session_table};

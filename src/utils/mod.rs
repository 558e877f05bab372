pub(crate) mod date;
pub(crate) mod logging;
pub(crate) mod prompt;

pub(crate) use date::parse_date;
pub(crate) use logging::init_logging;
pub(crate) use prompt::confirm;

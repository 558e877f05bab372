use serde::Serialize;

use crate::error::AppError;

/// Pretty-print any serializable value to stdout
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Maps `Box<dyn Error>` from trait boundaries to typed `ConnError`.
//!
//! The traits in `feeder_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `feeder_hardware::HwError` downcasting.

use crate::error::ConnError;

/// Map a trait-boundary error to a typed `ConnError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ConnError {
    // Feature-gated: try to downcast to HwError for precise mapping
    #[cfg(feature = "hardware-errors")]
    {
        use feeder_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::AccessDenied(msg) => ConnError::AccessDenied(msg.clone()),
                other => ConnError::Io(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>()
        && io.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ConnError::AccessDenied(io.to_string());
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("access denied") || lower.contains("permission denied") {
        ConnError::AccessDenied(s)
    } else {
        ConnError::Io(s)
    }
}

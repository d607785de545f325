//! # Utility Functions Module
//!
//! Small helpers for building engine argument vectors.

use std::path::Path;

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust,ignore
/// use crate::utils::to_string_vec;
///
/// let crf = 23;
/// let args = to_string_vec(["-crf", &crf.to_string(), "-y"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Lossy string form of a path, for use as an engine argument
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Macro for convenient argument building.
///
/// # Example
/// ```rust,ignore
/// use crate::args;
///
/// let crf = 23;
/// let args = args!["-crf", crf, "-y"];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

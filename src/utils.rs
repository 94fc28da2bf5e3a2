//! Shared utility functions and traits

/// Extension trait for recording first/last occurrences in `Option<T>`.
///
/// # Example
///
/// ```
/// use kbqueue::utils::FirstLastExt;
///
/// let mut first: Option<u64> = None;
/// let mut last: Option<u64> = None;
///
/// for t in [10, 20, 30] {
///     first.record_first(t);
///     last.record_last(t);
/// }
/// assert_eq!(first, Some(10));
/// assert_eq!(last, Some(30));
/// ```
pub trait FirstLastExt<T: Copy> {
    /// Stores `value` only if nothing has been recorded yet.
    fn record_first(&mut self, value: T);

    /// Always stores `value`.
    fn record_last(&mut self, value: T);
}

impl<T: Copy> FirstLastExt<T> for Option<T> {
    fn record_first(&mut self, value: T) {
        self.get_or_insert(value);
    }

    fn record_last(&mut self, value: T) {
        *self = Some(value);
    }
}

use crate::record::{Rating, Record};

/// Keeps the records rated at least `threshold`, preserving their order.
pub fn filter_by_threshold<I>(records: I, threshold: Rating) -> impl Iterator<Item = Record>
where
    I: IntoIterator<Item = Record>,
{
    records
        .into_iter()
        .filter(move |record| record.meets_threshold(threshold))
}

/// Upstream data sources.
///
/// Only the pegelalarm list API today; another provider would get its own
/// file here rather than growing this one.

pub mod pegelalarm;

#[cfg(test)]
pub(crate) mod fixtures;

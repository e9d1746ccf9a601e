//! Fundamental disclosure access port trait.

use crate::domain::error::FundtraderError;
use crate::domain::fundamental::FundamentalRecord;

pub trait FundamentalProvider {
    /// Every disclosed record for `code`, in any order. No records is not an
    /// error.
    fn fetch_fundamentals(&self, code: &str) -> Result<Vec<FundamentalRecord>, FundtraderError>;
}

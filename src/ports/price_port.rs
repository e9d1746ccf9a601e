//! Daily price access port trait.

use crate::domain::error::FundtraderError;
use crate::domain::price::PriceBar;
use chrono::NaiveDate;

pub trait PriceProvider {
    /// Bars for `code` with `start_date <= date <= end_date`, ascending and
    /// free of duplicate dates.
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FundtraderError>;

    fn list_codes(&self) -> Result<Vec<String>, FundtraderError>;
}

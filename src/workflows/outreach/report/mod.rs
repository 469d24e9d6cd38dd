mod monthly;
mod summary;
pub mod views;

pub use monthly::{MonthlyReport, MonthlySales};
pub use summary::RunSummary;
pub use views::{ActionReport, CustomerView};

mod calculation;
mod client;
mod establishment;
mod line_item;
mod report;
mod tax_configuration;
mod tax_exemption;

pub use calculation::{
    AppliedExemption, CalculationFilter, CalculationRequest, CalculationResult, NewCalculation,
    TaxBreakdown, TaxDetail,
};
pub use client::{Client, NewClient};
pub use establishment::{
    DEFAULT_CURRENCY, Establishment, MAX_UTC_OFFSET_MINUTES, NewEstablishment,
    is_valid_utc_offset,
};
pub use line_item::{LineItem, PricedLineItem};
pub use report::{
    DailyTaxSummary, ExemptionSummary, ExemptionTypeSummary, ReportPeriod, ReportQuery,
    ReportSummary, TaxReport, TaxTypeSummary,
};
pub use tax_configuration::{
    ConfigurationFilter, NewTaxConfiguration, TaxConfiguration, TaxConfigurationInput, TaxType,
};
pub use tax_exemption::{ExemptionFilter, NewTaxExemption, TaxExemption, TaxExemptionInput};

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::ledger::LedgerImportError;
use crate::workflows::outreach::BusinessConfigError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    BusinessConfig(BusinessConfigError),
    Ledger(LedgerImportError),
    Output(serde_json::Error),
}

impl AppError {
    /// Process exit code used by the binary for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::BusinessConfig(_) => 2,
            AppError::Ledger(_) => 3,
            AppError::Telemetry(_) | AppError::Io(_) | AppError::Output(_) => 1,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::BusinessConfig(err) => write!(f, "business configuration error: {}", err),
            AppError::Ledger(err) => write!(f, "ledger error: {}", err),
            AppError::Output(err) => write!(f, "failed to serialize report: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::BusinessConfig(err) => Some(err),
            AppError::Ledger(err) => Some(err),
            AppError::Output(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<BusinessConfigError> for AppError {
    fn from(value: BusinessConfigError) -> Self {
        Self::BusinessConfig(value)
    }
}

impl From<LedgerImportError> for AppError {
    fn from(value: LedgerImportError) -> Self {
        Self::Ledger(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

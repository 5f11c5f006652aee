//! Domain error types.

/// Why a trade proposal was not turned into an order.
///
/// The `Display` text is what gets logged as the rejection reason.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("no signal")]
    NoSignal,

    #[error("low confidence: {confidence:.1}% < {minimum:.1}%")]
    LowConfidence { confidence: f64, minimum: f64 },

    #[error("daily limit reached")]
    DailyLimitReached,

    #[error("position already exists")]
    PositionExists,

    #[error("insufficient margin: {free_margin:.2} < {floor:.2}")]
    InsufficientMargin { free_margin: f64, floor: f64 },

    #[error("zero stop distance")]
    ZeroStopDistance,

    #[error("lot size too small: {lots} < {min_lot}")]
    LotTooSmall { lots: f64, min_lot: f64 },

    #[error("invalid symbol constraints: {reason}")]
    InvalidConstraints { reason: String },

    #[error("account unavailable: {reason}")]
    AccountUnavailable { reason: String },
}

/// Top-level error type for fusetrader.
#[derive(Debug, thiserror::Error)]
pub enum FusetraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol} on {timeframe}")]
    DataUnavailable { symbol: String, timeframe: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error("invalid model: {reason}")]
    ModelInvalid { reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("execution failed for {symbol}: {reason}")]
    Execution { symbol: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&FusetraderError> for std::process::ExitCode {
    fn from(err: &FusetraderError) -> Self {
        let code: u8 = match err {
            FusetraderError::Io(_) => 1,
            FusetraderError::ConfigParse { .. }
            | FusetraderError::ConfigMissing { .. }
            | FusetraderError::ConfigInvalid { .. } => 2,
            FusetraderError::Database { .. } | FusetraderError::DatabaseQuery { .. } => 3,
            FusetraderError::ModelUnavailable { .. } | FusetraderError::ModelInvalid { .. } => 4,
            FusetraderError::DataUnavailable { .. }
            | FusetraderError::InsufficientData { .. }
            | FusetraderError::InvalidSeries { .. } => 5,
            FusetraderError::Broker { .. } | FusetraderError::Execution { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_limit_reason_text() {
        assert_eq!(RejectReason::DailyLimitReached.to_string(), "daily limit reached");
    }

    #[test]
    fn low_confidence_reason_text() {
        let reason = RejectReason::LowConfidence {
            confidence: 62.345,
            minimum: 75.0,
        };
        assert_eq!(reason.to_string(), "low confidence: 62.3% < 75.0%");
    }

    #[test]
    fn config_missing_display() {
        let err = FusetraderError::ConfigMissing {
            section: "engine".into(),
            key: "symbols".into(),
        };
        assert_eq!(err.to_string(), "missing config key [engine] symbols");
    }

    #[test]
    fn data_unavailable_display() {
        let err = FusetraderError::DataUnavailable {
            symbol: "EURUSD".into(),
            timeframe: "M15".into(),
        };
        assert_eq!(err.to_string(), "no data for EURUSD on M15");
    }
}

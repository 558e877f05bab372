mod analysis;
mod multipart;
mod types;

pub(crate) use analysis::AnalysisClient;
pub(crate) use types::{
    AnalysisRequest, DeficiencyPrediction, HistoryEntry, PestDetection, WeatherGuidance,
};

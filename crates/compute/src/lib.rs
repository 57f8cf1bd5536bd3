pub mod algorithms;
pub mod anomaly;
pub mod engine;
pub mod normalize;
pub mod segmentation;
pub mod similarity;

pub use anomaly::{
    detect_price_anomalies, detect_price_anomalies_with, detect_spec_outliers, AnomalyReport,
    PriceModel,
};
pub use engine::{AnalyticsEngine, AnalyticsReport, StageTimings};
pub use normalize::NormalizationParams;
pub use segmentation::{
    segment_market, segment_market_with, MarketSegment, MarketSegmentation, SegmentLabel,
};
pub use similarity::{find_similar, find_similar_to_member, find_similar_with, SimilarityResult};

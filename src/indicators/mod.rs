pub mod rci;
pub use rci::{
    rank_correlation_index, rci, RciBatchBuilder, RciBatchOutput, RciBatchRange, RciBuilder, RciError,
    RciInput, RciOutput, RciParams,
};
pub mod rolling_rank;
pub use rolling_rank::{
    rolling_rank, rolling_rank_slice, RollingRankBatchBuilder, RollingRankBatchOutput,
    RollingRankBatchRange, RollingRankBuilder, RollingRankError, RollingRankInput, RollingRankOutput,
    RollingRankParams,
};

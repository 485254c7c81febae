pub mod round_tally;
pub mod transfers;

pub use round_tally::{RoundTally, SurplusAdjustmentToken};
pub use transfers::{Allocatee, TallyTransfers};

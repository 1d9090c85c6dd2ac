// Domain-layer modules and shared errors/models
pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod offer_matcher {
    pub use crate::offer_matcher::*;
}

pub mod referral {
    pub use crate::referral::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}

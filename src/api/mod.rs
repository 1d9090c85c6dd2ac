// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod admin_handlers {
    pub use crate::admin_handlers::*;
}

pub mod kyc_handler {
    pub use crate::kyc_handler::*;
}

pub mod payment_handler {
    pub use crate::payment_handler::*;
}

pub mod router {
    pub use crate::router::*;
}

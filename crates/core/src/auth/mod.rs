//! Bearer-token issuance for the download service.

mod copernicus;
mod shared;
mod traits;
mod types;

pub use copernicus::CopernicusAuth;
pub use shared::SharedToken;
pub use traits::*;
pub use types::*;

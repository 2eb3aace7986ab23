use serde::{Deserialize, Serialize};

/// JWT payload set by the auth middleware. `sub` is the donor's ObjectId hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default service-bay capacity for a newly created workshop.
pub const DEFAULT_CAPACITY: i32 = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workshop {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub logo: Option<String>,
    /// Maximum number of turns simultaneously in service. Always >= 1.
    pub capacity: i32,
}

impl Workshop {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: None,
            logo: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Deleting is idempotent, so the result is always a success
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[non_exhaustive]
pub struct MethodResult {
    pub success: bool,
}

impl MethodResult {
    pub fn new() -> Self {
        Self { success: true }
    }
}

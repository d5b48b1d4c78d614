use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ToastStatus {
    pub should_show: bool,
}

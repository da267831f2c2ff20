use std::sync::Arc;

use cineseat_engine::BookingService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
}

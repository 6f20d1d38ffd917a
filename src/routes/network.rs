use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::SharedState;

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub online: bool,
}

pub async fn get(State(state): State<SharedState>) -> Json<NetworkStatus> {
    Json(NetworkStatus {
        online: state.engine.network().is_online(),
    })
}

pub async fn set(
    State(state): State<SharedState>,
    Json(body): Json<NetworkStatus>,
) -> Json<NetworkStatus> {
    state.engine.network().set_online(body.online);
    Json(NetworkStatus {
        online: state.engine.network().is_online(),
    })
}

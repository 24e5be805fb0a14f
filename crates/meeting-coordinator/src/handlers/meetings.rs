//! Meeting REST handlers.
//!
//! - `POST /api/create-meeting` - allocate a meeting id and its page paths
//! - `GET /api/meeting/:meeting_id` - summary of a live meeting
//! - `GET /api/ice-servers` - relay descriptors for peer connections
//!
//! Creating a meeting here reserves nothing; the meeting starts when a host
//! sends `join-as-host` with the returned id.

use crate::errors::CoordinatorError;
use crate::meeting::{generate_meeting_id, IceServer, Permissions};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingResponse {
    pub meeting_id: String,
    pub host_url: String,
    pub join_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInfoResponse {
    pub id: String,
    pub host_name: String,
    pub participant_count: usize,
    pub created_at: DateTime<Utc>,
    pub is_locked: bool,
    pub permissions: Permissions,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServersResponse {
    pub ice_servers: Vec<IceServer>,
}

/// Handler for `POST /api/create-meeting`.
#[instrument(skip_all, name = "coord.handlers.meetings.create")]
pub async fn create_meeting(State(state): State<Arc<AppState>>) -> Json<CreateMeetingResponse> {
    // Skip ids that are already live so the host does not collide on join.
    let meeting_id = std::iter::repeat_with(generate_meeting_id)
        .take(16)
        .find(|id| state.directory.lookup(id).is_none())
        .unwrap_or_else(generate_meeting_id);

    debug!(target: "coord.handlers.meetings", meeting_id = %meeting_id, "Meeting id allocated");

    Json(CreateMeetingResponse {
        host_url: format!("/host/{meeting_id}"),
        join_url: format!("/join/{meeting_id}"),
        meeting_id,
    })
}

/// Handler for `GET /api/meeting/:meeting_id`.
///
/// # Errors
///
/// 404 if the meeting is not live.
#[instrument(skip(state), name = "coord.handlers.meetings.get", fields(meeting_id = %meeting_id))]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingInfoResponse>, CoordinatorError> {
    let info = state.directory.meeting_info(&meeting_id).await?;

    Ok(Json(MeetingInfoResponse {
        participant_count: info.participant_count(),
        id: info.meeting_id,
        host_name: info.host_name,
        created_at: info.created_at,
        is_locked: info.is_locked,
        permissions: info.permissions,
    }))
}

/// Handler for `GET /api/ice-servers`.
#[instrument(skip_all, name = "coord.handlers.meetings.ice_servers")]
pub async fn get_ice_servers(State(state): State<Arc<AppState>>) -> Json<IceServersResponse> {
    Json(IceServersResponse {
        ice_servers: state.directory.ice_servers().to_vec(),
    })
}

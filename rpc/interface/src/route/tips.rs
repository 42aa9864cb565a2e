//! `GET /tips`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use tangle_dag::DagStore;
use tangle_tipselect::TipSelectError;
use tangle_types::TxId;

use crate::{
    api::TipApi,
    error::{err, ApiError},
};

/// Query parameters of `GET /tips`.
#[derive(Deserialize)]
pub(crate) struct TipsParams {
    /// Optional hash to use as the branch instead of a second pick.
    reference: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TipsResponse {
    /// `[trunk, branch]`.
    tip_hashes: [String; 2],
}

pub(crate) async fn tips<D>(
    State(api): State<TipApi<D>>,
    Query(params): Query<TipsParams>,
) -> Result<Json<TipsResponse>, ApiError>
where
    D: DagStore + Clone + Send + Sync + 'static,
    D::Future: Send + 'static,
{
    if !api.enabled {
        return Err(err(
            StatusCode::SERVICE_UNAVAILABLE,
            "tipselection plugin disabled",
        ));
    }

    let reference = params
        .reference
        .as_deref()
        .map(|reference| {
            TxId::from_hex(reference)
                .map_err(|_| err(StatusCode::BAD_REQUEST, "invalid reference hash supplied"))
        })
        .transpose()?;

    let selected = match reference {
        Some(reference) => api.selector.select_tips_with_reference(reference).await,
        None => api.selector.select_tips().await,
    };

    match selected {
        Ok((trunk, branch)) => Ok(Json(TipsResponse {
            tip_hashes: [trunk.to_string(), branch.to_string()],
        })),
        Err(
            e @ (TipSelectError::NodeNotSynced
            | TipSelectError::NoTipsAvailable
            | TipSelectError::SelectTimeout),
        ) => Err(err(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

//! `GET /getTipInfo`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use tangle_dag::DagStore;
use tangle_tipselect::TipInfoError;
use tangle_types::TxId;

use crate::{
    api::TipApi,
    error::{err, ApiError},
};

/// Query parameters of `GET /getTipInfo`.
#[derive(Deserialize)]
pub(crate) struct TipInfoParams {
    /// The tail transaction to report on.
    tail: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TipInfoResponse {
    confirmed: bool,
    conflicting: bool,
    should_promote: bool,
    should_reattach: bool,
}

pub(crate) async fn get_tip_info<D>(
    State(api): State<TipApi<D>>,
    Query(params): Query<TipInfoParams>,
) -> Result<Json<TipInfoResponse>, ApiError>
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

    if !api.sync.is_synced_within(api.config.sync_threshold) {
        return Err(err(StatusCode::SERVICE_UNAVAILABLE, "node not synced"));
    }

    let Some(tail) = params
        .tail
        .as_deref()
        .and_then(|tail| TxId::from_hex(tail).ok())
    else {
        return Err(err(StatusCode::BAD_REQUEST, "invalid tail hash supplied"));
    };

    match api.classifier.tip_info(tail, api.sync.lsmi()).await {
        Ok(info) => Ok(Json(TipInfoResponse {
            confirmed: info.confirmed,
            conflicting: info.conflicting,
            should_promote: info.should_promote,
            should_reattach: info.should_reattach,
        })),
        Err(
            e @ (TipInfoError::UnknownTransaction
            | TipInfoError::NotATail
            | TipInfoError::NotSolid),
        ) => Err(err(StatusCode::BAD_REQUEST, e.to_string())),
        Err(TipInfoError::Store(e)) => {
            tracing::error!("DAG store error answering tip info: {e}");
            Err(err(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ))
        }
    }
}

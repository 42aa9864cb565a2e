//! Tangle tip-selection REST interface.
//!
//! [`axum`] routes exposing the tip-selection core:
//!
//! - `GET /tips` selects two tips for a new message, optionally overriding
//!   the branch with a `reference` hash.
//! - `GET /getTipInfo` gives promotion/reattachment advice for a tail.
//!
//! The routes are generic over the DAG store; state is injected through
//! [`TipApi`], node assembly stays outside this crate.

use axum::{routing::get, Router};

use tangle_dag::DagStore;

mod api;
mod error;
mod route;

pub use api::TipApi;

/// Creates the router exposing the tip-selection endpoints.
pub fn create_router<D>(api: TipApi<D>) -> Router
where
    D: DagStore + Clone + Send + Sync + 'static,
    D::Future: Send + 'static,
{
    Router::new()
        .route("/tips", get(route::tips::tips::<D>))
        .route("/getTipInfo", get(route::tip_info::get_tip_info::<D>))
        .with_state(api)
}

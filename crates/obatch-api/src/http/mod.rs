//! HTTP endpoints.
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/{cell}/{box}/{collection}/$batch` | POST | Multipart batch of sub-requests |
//! | `/health` | GET | Liveness probe |
//! | `/ready` | GET | Readiness probe (storage health) |
//! | `/metrics` | GET | Prometheus metrics (observability router only) |

pub mod routes;
pub mod state;

pub use routes::{
    create_router, create_router_with_body_limit, create_router_with_limits,
    create_router_with_observability, create_router_with_observability_and_limit,
    error_codes, ApiError, RouterLimits, DATA_SERVICE_VERSION_HEADER, DEFAULT_BODY_LIMIT,
    DEFAULT_PROBE_TIMEOUT,
};
pub use state::AppState;

//! Errors for drag-protocol violations.
//!
//! Geometry queries never fail: unknown ids and degenerate rectangles yield
//! `None` or an empty result. Only calls made out of order in the drag
//! lifecycle are reported.

use crate::ids::{LinkId, RerouteId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("a link drag is already in progress")]
    AlreadyDragging,
    #[error("no link drag is in progress")]
    NotDragging,
    #[error("a link drag needs at least one candidate link")]
    NoCandidates,
    #[error("candidate links must all connect to the same kind of slot")]
    MixedDirections,
    #[error("link {0} does not exist")]
    UnknownLink(LinkId),
    #[error("reroute {0} does not exist")]
    UnknownReroute(RerouteId),
    #[error("reroute {0} has no link to drag from")]
    NoSource(RerouteId),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
